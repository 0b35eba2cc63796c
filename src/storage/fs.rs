//! src/storage/fs.rs
use crate::error::StoreError;
use crate::model::{Day, KeyType, ShardEntry};
use crate::storage::{check_key, decode_shard, encode_shard, ShardKey, ShardStore, ShardWrite};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Shards laid out as
/// `{root}/listen-{YYYYMMDD}/{countries|users}/{key}/top-{YYYYMMDD}-{tag}-{chunk}.csv`.
#[derive(Debug, Clone)]
pub struct FsShardStore {
    root: PathBuf,
}

impl FsShardStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        FsShardStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn day_dir(&self, day: Day) -> PathBuf {
        self.root.join(format!("listen-{}", day.stamp()))
    }

    pub fn key_type_dir(&self, day: Day, key_type: KeyType) -> PathBuf {
        self.day_dir(day).join(key_type.dir_name())
    }

    pub fn key_dir(&self, day: Day, key_type: KeyType, key: &str) -> PathBuf {
        self.key_type_dir(day, key_type).join(key)
    }

    pub fn shard_path(&self, shard: &ShardKey) -> PathBuf {
        self.key_dir(shard.day, shard.key_type, &shard.key)
            .join(shard.file_name())
    }

    /// Visible entry names of `dir`, or nothing when it doesn't exist.
    fn entries(dir: &Path) -> Result<Vec<(String, fs::FileType)>, StoreError> {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StoreError::io(dir.display(), e)),
        };
        let mut names = vec![];
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::io(dir.display(), e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| StoreError::io(entry.path().display(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push((name, file_type));
            }
        }
        Ok(names)
    }
}

impl ShardStore for FsShardStore {
    fn list_keys(&self, day: Day, key_type: KeyType) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = Self::entries(&self.key_type_dir(day, key_type))?
            .into_iter()
            .filter(|(name, file_type)| file_type.is_dir() && check_key(name).is_ok())
            .map(|(name, _)| name)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn list_shards(
        &self,
        day: Day,
        key_type: KeyType,
        key: &str,
    ) -> Result<Vec<ShardKey>, StoreError> {
        check_key(key)?;
        let dir = self.key_dir(day, key_type, key);
        let mut shards = vec![];
        for (name, _) in Self::entries(&dir)? {
            let shard = ShardKey::parse_file_name(day, key_type, key, &name).ok_or_else(|| {
                StoreError::CorruptShard {
                    location: dir.join(&name).display().to_string(),
                    line: 0,
                    reason: "unrecognised shard file name".to_string(),
                }
            })?;
            shards.push(shard);
        }
        shards.sort_by_key(|shard| shard.chunk);
        Ok(shards)
    }

    #[tracing::instrument(name = "Read shard", level = "debug", skip(self))]
    fn read_shard(&self, shard: &ShardKey) -> Result<Vec<ShardEntry>, StoreError> {
        let path = self.shard_path(shard);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => StoreError::CorruptShard {
                location: path.display().to_string(),
                line: 0,
                reason: "shard is not valid UTF-8".to_string(),
            },
            _ => StoreError::io(path.display(), e),
        })?;
        decode_shard(&path.display().to_string(), &text)
    }

    fn write_shard(
        &self,
        shard: &ShardKey,
        entries: &[ShardEntry],
    ) -> Result<ShardWrite, StoreError> {
        check_key(&shard.key)?;
        let dir = self.key_dir(shard.day, shard.key_type, &shard.key);
        // create_dir_all tolerates a concurrent writer creating the same directory.
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(dir.display(), e))?;

        let path = dir.join(shard.file_name());
        let body = encode_shard(entries);
        let tmp = dir.join(format!(".{}.{}.partial", shard.file_name(), Uuid::new_v4()));
        let linked = write_new_file(&tmp, body.as_bytes())
            .map_err(|e| StoreError::io(tmp.display(), e))
            .and_then(|()| match fs::hard_link(&tmp, &path) {
                Ok(()) => Ok(ShardWrite::Created),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let stored = fs::read(&path).map_err(|e| StoreError::io(path.display(), e))?;
                    if stored == body.as_bytes() {
                        Ok(ShardWrite::Unchanged)
                    } else {
                        Err(StoreError::ShardExists {
                            location: path.display().to_string(),
                        })
                    }
                }
                Err(e) => Err(StoreError::io(path.display(), e)),
            });
        let _ = fs::remove_file(&tmp);
        linked
    }

    fn remove_shard(&self, shard: &ShardKey) -> Result<(), StoreError> {
        check_key(&shard.key)?;
        let path = self.shard_path(shard);
        // Key directories are left in place.
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path.display(), e)),
        }
    }
}

/// Creates `path`, failing if it exists, and syncs `data` to disk.
pub(crate) fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file = File::create_new(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
