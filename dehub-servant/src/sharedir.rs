use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use dehub_common::MountDirMeta;
use dehub_ssh::ChannelStream;
use nfsserve::nfs::{fattr3, fileid3, filename3, ftype3, nfspath3, nfsstat3, nfstime3, sattr3, specdata3};
use nfsserve::tcp::{NFSTcpListener, NFSTcpListenerTrait};
use nfsserve::vfs::{DirEntry, NFSFileSystem, ReadDirResult, VFSCapabilities};
use tokio::net::TcpStream;
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::{error, warn};

use crate::dispatch::log_meta_error;

/// Parses `meta`, opens an NFSv3 server rooted at `meta.path` on a loopback
/// port, then for each stream accepted on an inner mux over `channel`, dials
/// that loopback port and splices the bytes (spec §4.5.5). `nfsserve`'s
/// public surface is TCP-listener oriented; dialing loopback per mux stream
/// lets it own the real NFSv3 wire protocol while we supply the transport.
pub async fn handle(meta: serde_json::Value, channel: ChannelStream) {
    let meta: MountDirMeta = match serde_json::from_value(meta) {
        Ok(meta) => meta,
        Err(error) => {
            log_meta_error("share-dir", &error);
            return;
        }
    };

    if !Path::new(&meta.path).exists() {
        warn!(path = %meta.path, "remote directory does not exist");
    }

    let fs = LocalDirFs::new(&meta.path, meta.effective_cache_limit() as usize);
    let listener = match NFSTcpListener::bind("127.0.0.1:0", fs).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%error, "failed to start nfs listener");
            return;
        }
    };
    let local_addr = format!("127.0.0.1:{}", listener.get_listen_port());

    tokio::spawn(async move {
        if let Err(error) = listener.handle_forever().await {
            warn!(%error, "nfs listener exited");
        }
    });

    let inner = dehub_core::Session::new(channel.compat(), dehub_core::Mode::Server);

    loop {
        let Some(stream) = inner.accept().await else {
            return;
        };

        let local_addr = local_addr.clone();
        tokio::spawn(async move {
            match TcpStream::connect(&local_addr).await {
                Ok(mut loopback) => {
                    let mut stream = stream.compat();
                    let _ = tokio::io::copy_bidirectional(&mut stream, &mut loopback).await;
                }
                Err(error) => warn!(%error, "failed to dial local nfs listener"),
            }
        });
    }
}

/// Minimal read-only NFSv3 filesystem rooted at a local directory. Assigns
/// file ids lazily as paths are looked up; `cache_limit` bounds how many of
/// those id↔path mappings are retained (spec §4.5.5's `CacheLimit`).
struct LocalDirFs {
    cache_limit: usize,
    ids: Mutex<IdTable>,
}

struct IdTable {
    next: fileid3,
    path_to_id: HashMap<PathBuf, fileid3>,
    id_to_path: HashMap<fileid3, PathBuf>,
    order: Vec<fileid3>,
}

const ROOT_ID: fileid3 = 1;

impl LocalDirFs {
    fn new(root: impl Into<PathBuf>, cache_limit: usize) -> Self {
        let root = root.into();
        let mut id_to_path = HashMap::new();
        id_to_path.insert(ROOT_ID, root);
        Self {
            cache_limit,
            ids: Mutex::new(IdTable {
                next: ROOT_ID + 1,
                path_to_id: HashMap::new(),
                id_to_path,
                order: vec![ROOT_ID],
            }),
        }
    }

    fn path_for(&self, id: fileid3) -> Result<PathBuf, nfsstat3> {
        self.ids
            .lock()
            .expect("lock poisoned")
            .id_to_path
            .get(&id)
            .cloned()
            .ok_or(nfsstat3::NFS3ERR_STALE)
    }

    fn id_for(&self, path: &Path) -> fileid3 {
        let mut table = self.ids.lock().expect("lock poisoned");
        if let Some(&id) = table.path_to_id.get(path) {
            return id;
        }
        let id = table.next;
        table.next += 1;
        table.path_to_id.insert(path.to_path_buf(), id);
        table.id_to_path.insert(id, path.to_path_buf());
        table.order.push(id);
        if table.order.len() > self.cache_limit {
            let evicted = table.order.remove(0);
            if let Some(path) = table.id_to_path.remove(&evicted) {
                table.path_to_id.remove(&path);
            }
        }
        id
    }

    fn attr_for(path: &Path) -> Result<fattr3, nfsstat3> {
        let metadata = std::fs::metadata(path).map_err(|_| nfsstat3::NFS3ERR_NOENT)?;
        let mtime = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        Ok(fattr3 {
            ftype: if metadata.is_dir() { ftype3::NF3DIR } else { ftype3::NF3REG },
            mode: 0o644,
            nlink: 1,
            uid: 0,
            gid: 0,
            size: metadata.len(),
            used: metadata.len(),
            rdev: specdata3::default(),
            fsid: 0,
            fileid: 0,
            atime: nfstime3 { seconds: mtime.as_secs() as u32, nseconds: 0 },
            mtime: nfstime3 { seconds: mtime.as_secs() as u32, nseconds: 0 },
            ctime: nfstime3 { seconds: mtime.as_secs() as u32, nseconds: 0 },
        })
    }
}

#[async_trait]
impl NFSFileSystem for LocalDirFs {
    fn root_dir(&self) -> fileid3 {
        ROOT_ID
    }

    fn capabilities(&self) -> VFSCapabilities {
        VFSCapabilities::ReadOnly
    }

    async fn lookup(&self, dirid: fileid3, filename: &filename3) -> Result<fileid3, nfsstat3> {
        let dir = self.path_for(dirid)?;
        let name = String::from_utf8_lossy(filename).into_owned();
        let path = dir.join(&name);
        if !path.exists() {
            return Err(nfsstat3::NFS3ERR_NOENT);
        }
        Ok(self.id_for(&path))
    }

    async fn getattr(&self, id: fileid3) -> Result<fattr3, nfsstat3> {
        let path = self.path_for(id)?;
        Self::attr_for(&path)
    }

    async fn setattr(&self, _id: fileid3, _setattr: sattr3) -> Result<fattr3, nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn read(&self, id: fileid3, offset: u64, count: u32) -> Result<(Vec<u8>, bool), nfsstat3> {
        let path = self.path_for(id)?;
        let data = std::fs::read(&path).map_err(|_| nfsstat3::NFS3ERR_IO)?;
        let start = offset.min(data.len() as u64) as usize;
        let end = (start + count as usize).min(data.len());
        let eof = end >= data.len();
        Ok((data[start..end].to_vec(), eof))
    }

    async fn write(&self, _id: fileid3, _offset: u64, _data: &[u8]) -> Result<fattr3, nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn create(&self, _dirid: fileid3, _filename: &filename3, _attr: sattr3) -> Result<(fileid3, fattr3), nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn create_exclusive(&self, _dirid: fileid3, _filename: &filename3) -> Result<fileid3, nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn mkdir(&self, _dirid: fileid3, _dirname: &filename3) -> Result<(fileid3, fattr3), nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn remove(&self, _dirid: fileid3, _filename: &filename3) -> Result<(), nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn rename(
        &self,
        _from_dirid: fileid3,
        _from_filename: &filename3,
        _to_dirid: fileid3,
        _to_filename: &filename3,
    ) -> Result<(), nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn readdir(&self, dirid: fileid3, start_after: fileid3, max_entries: usize) -> Result<ReadDirResult, nfsstat3> {
        let dir = self.path_for(dirid)?;
        let mut entries = Vec::new();
        let mut past_cursor = start_after == 0;

        let read_dir = std::fs::read_dir(&dir).map_err(|_| nfsstat3::NFS3ERR_NOTDIR)?;
        for entry in read_dir {
            let entry = entry.map_err(|_| nfsstat3::NFS3ERR_IO)?;
            let path = entry.path();
            let id = self.id_for(&path);

            if !past_cursor {
                if id == start_after {
                    past_cursor = true;
                }
                continue;
            }

            if entries.len() >= max_entries {
                return Ok(ReadDirResult { entries, end: false });
            }

            entries.push(DirEntry {
                fileid: id,
                name: entry.file_name().as_encoded_bytes().to_vec().into(),
                attr: Self::attr_for(&path)?,
            });
        }

        Ok(ReadDirResult { entries, end: true })
    }

    async fn symlink(
        &self,
        _dirid: fileid3,
        _linkname: &filename3,
        _symlink: &nfspath3,
        _attr: &sattr3,
    ) -> Result<(fileid3, fattr3), nfsstat3> {
        Err(nfsstat3::NFS3ERR_ROFS)
    }

    async fn readlink(&self, _id: fileid3) -> Result<nfspath3, nfsstat3> {
        Err(nfsstat3::NFS3ERR_NOTSUPP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn looks_up_and_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greeting.txt"), b"hello world").unwrap();

        let fs = LocalDirFs::new(dir.path(), 2048);
        let id = fs.lookup(fs.root_dir(), &b"greeting.txt".to_vec().into()).await.unwrap();
        let (data, eof) = fs.read(id, 0, 1024).await.unwrap();

        assert_eq!(data, b"hello world");
        assert!(eof);
    }

    #[tokio::test]
    async fn lookup_of_missing_file_errs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalDirFs::new(dir.path(), 2048);

        let result = fs.lookup(fs.root_dir(), &b"missing.txt".to_vec().into()).await;
        assert_eq!(result, Err(nfsstat3::NFS3ERR_NOENT));
    }

    #[tokio::test]
    async fn write_is_rejected_on_a_read_only_mount() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalDirFs::new(dir.path(), 2048);

        let result = fs.write(fs.root_dir(), 0, b"no").await;
        assert_eq!(result.unwrap_err(), nfsstat3::NFS3ERR_ROFS);
    }

    #[test]
    fn id_table_evicts_oldest_entry_past_cache_limit() {
        let fs = LocalDirFs::new("/tmp", 2);
        let a = fs.id_for(Path::new("/tmp/a"));
        let _b = fs.id_for(Path::new("/tmp/b"));
        let _c = fs.id_for(Path::new("/tmp/c"));

        let table = fs.ids.lock().unwrap();
        assert!(!table.id_to_path.contains_key(&a));
    }
}
