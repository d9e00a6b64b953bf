use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{Context, Result, anyhow};
use roomdrop_session::{
    LoopbackConnector, MemoryRelay, RelayConfig, Role, Session,
};
use roomdropx_common::DirectChannel;
use roomdropx_receiver::{ReceiveFilesHandler, ReceivedFile};
use roomdropx_sender::{
    SendFilesRequest, SenderConfig, SenderFile, SenderFileData, send_files,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::progress::TransferProgress;

/// Inputs of a loopback transfer.
#[derive(Clone, Debug)]
pub struct TransferOptions {
    pub files: Vec<PathBuf>,
    /// Parent of the per-transfer directory.
    pub output: PathBuf,
    pub code: Option<String>,
    pub pin: Option<String>,
    pub config: SenderConfig,
}

#[derive(Clone, Debug)]
pub struct TransferReport {
    pub room: String,
    pub directory: PathBuf,
    pub saved: Vec<PathBuf>,
    pub abandoned: Vec<String>,
}

/// Runs both endpoints in this process: the initiator creates the room and
/// sends, the responder joins and writes what it receives into a fresh
/// `<output>/<uuid>/` directory.
pub async fn run_transfer(options: TransferOptions) -> Result<TransferReport> {
    let files = create_sender_files(&options.files)?;
    let bubble = send_files(SendFilesRequest {
        files,
        config: options.config,
    })
    .context("Failed to prepare files")?;

    let progress = Arc::new(TransferProgress::new());
    bubble.subscribe(progress.clone());

    let relay = MemoryRelay::new(RelayConfig::from_env());
    let (left, right) = LoopbackConnector::pair();
    let mut initiator = Session::new(relay.connect(), left);
    let mut responder = Session::new(relay.connect(), right);

    let room = initiator
        .create_room(options.code.as_deref(), options.pin.as_deref())
        .await
        .context("Failed to create room")?;
    initiator.choose_role(Role::Initiator).await?;
    responder
        .join_room(&room, options.pin.as_deref())
        .await
        .with_context(|| format!("Failed to join room {}", room))?;
    responder.choose_role(Role::Responder).await?;
    println!("Room: {}", room);

    let (sending, receiving) =
        tokio::join!(initiator.negotiate(), responder.negotiate());
    let sending = sending.context("Sender failed to connect")?;
    let receiving = receiving.context("Receiver failed to connect")?;

    let directory = create_receiving_dir(&options.output)?;
    println!("Files will be saved to: {}", directory.display());

    let send = async {
        let result = bubble.send_all(sending.as_ref()).await;
        sending.close();
        result
    };
    let receive = async {
        let mut handler = ReceiveFilesHandler::new();
        handler.subscribe(progress.clone());
        let result =
            save_all(&mut handler, receiving.as_ref(), &directory).await;
        receiving.close();
        result
    };
    let (initiator_done, responder_done, sent, saved) = tokio::join!(
        initiator.monitor(),
        responder.monitor(),
        send,
        receive
    );
    initiator.close().await;
    responder.close().await;

    initiator_done?;
    responder_done?;
    let saved = saved?;
    sent?;

    Ok(TransferReport {
        room,
        directory,
        saved,
        abandoned: progress.abandoned(),
    })
}

async fn save_all<C: DirectChannel>(
    handler: &mut ReceiveFilesHandler,
    channel: &C,
    directory: &Path,
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();
    while let Some(file) = handler.receive_next(channel).await? {
        saved.push(save_file(directory, &file)?);
    }
    Ok(saved)
}

fn save_file(directory: &Path, file: &ReceivedFile) -> Result<PathBuf> {
    let path = unique_path(directory, &sanitize_file_name(&file.name));
    fs::File::create(&path)
        .and_then(|mut out| file.data.write_to(&mut out))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved {} to {}", file.name, path.display());
    Ok(path)
}

fn create_receiving_dir(output: &Path) -> Result<PathBuf> {
    let directory = output.join(Uuid::new_v4().to_string());
    fs::create_dir_all(&directory).with_context(|| {
        format!(
            "Failed to create receiving directory: {}",
            directory.display()
        )
    })?;
    Ok(directory)
}

fn create_sender_files(paths: &[PathBuf]) -> Result<Vec<SenderFile>> {
    if paths.is_empty() {
        return Err(anyhow!("Cannot send an empty list of files"));
    }
    for path in paths {
        if !path.exists() {
            return Err(anyhow!("File does not exist: {}", path.display()));
        }
        if !path.is_file() {
            return Err(anyhow!("Path is not a file: {}", path.display()));
        }
    }

    let mut files = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?
            .to_string();
        let mime_type = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type().to_string());
        debug!("{} detected as {:?}", name, mime_type);

        files.push(SenderFile {
            name,
            mime_type,
            data: Arc::new(FileData::new(path.clone())?),
        });
    }
    Ok(files)
}

/// Keeps the final path component of a peer-supplied name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => "unnamed".to_string(),
        base => base.to_string(),
    }
}

/// `dir/name`, or `dir/stem (n).ext` when that is taken.
fn unique_path(directory: &Path, name: &str) -> PathBuf {
    let candidate = directory.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let name = Path::new(name);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    let extension = name.extension().and_then(|e| e.to_str());
    let mut n = 1;
    loop {
        let file_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = directory.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Sequential reader over a file on disk.
///
/// Errors are logged and end the stream; the sender then reports the file
/// as short.
struct FileData {
    path: PathBuf,
    size: u64,
    reader: Mutex<Option<fs::File>>,
}

impl FileData {
    fn new(path: PathBuf) -> Result<Self> {
        let metadata = fs::metadata(&path).with_context(|| {
            format!("Failed to get metadata for file: {}", path.display())
        })?;
        Ok(Self {
            path,
            size: metadata.len(),
            reader: Mutex::new(None),
        })
    }
}

impl SenderFileData for FileData {
    fn len(&self) -> u64 {
        self.size
    }

    fn read_chunk(&self, size: u64) -> Vec<u8> {
        let mut reader =
            self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if reader.is_none() {
            match fs::File::open(&self.path) {
                Ok(file) => *reader = Some(file),
                Err(e) => {
                    error!("Error opening {}: {}", self.path.display(), e);
                    return Vec::new();
                }
            }
        }
        let Some(file) = reader.as_mut() else {
            return Vec::new();
        };

        let mut buffer = Vec::with_capacity(size.min(self.size) as usize);
        match Read::by_ref(file).take(size).read_to_end(&mut buffer) {
            Ok(_) => buffer,
            Err(e) => {
                error!("Error reading {}: {}", self.path.display(), e);
                *reader = None;
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn names_lose_their_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\temp\\a.txt"), "a.txt");
        assert_eq!(sanitize_file_name(".."), "unnamed");
        assert_eq!(sanitize_file_name("dir/"), "unnamed");
        assert_eq!(sanitize_file_name("photo.jpg"), "photo.jpg");
    }

    #[test]
    fn taken_names_get_a_counter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();
        fs::write(dir.path().join("a (1).txt"), b"x").unwrap();

        assert_eq!(
            unique_path(dir.path(), "a.txt"),
            dir.path().join("a (2).txt")
        );
        assert_eq!(unique_path(dir.path(), "b"), dir.path().join("b"));
    }

    #[test]
    fn file_data_reads_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, (0..10u8).collect::<Vec<_>>()).unwrap();

        let data = FileData::new(path).unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(data.read_chunk(4), vec![0, 1, 2, 3]);
        assert_eq!(data.read_chunk(4), vec![4, 5, 6, 7]);
        assert_eq!(data.read_chunk(4), vec![8, 9]);
        assert!(data.read_chunk(4).is_empty());
    }

    #[test]
    fn missing_files_are_rejected() {
        let err = create_sender_files(&[PathBuf::from("nope.txt")])
            .err()
            .unwrap();
        assert!(err.to_string().contains("File does not exist"));
        assert!(create_sender_files(&[]).is_err());
    }

    #[tokio::test]
    async fn transfer_writes_received_files() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let big = source.path().join("big.bin");
        let small = source.path().join("note.txt");
        let content: Vec<u8> = (0..3 * 1024 * 1024u32)
            .map(|i| (i % 251) as u8)
            .collect();
        fs::write(&big, &content).unwrap();
        fs::write(&small, b"hello").unwrap();

        let report = run_transfer(TransferOptions {
            files: vec![big, small],
            output: output.path().to_path_buf(),
            code: Some("ROOM42".into()),
            pin: Some("1234".into()),
            config: SenderConfig::default(),
        })
        .await
        .unwrap();

        assert_eq!(report.room, "ROOM42");
        assert!(report.directory.starts_with(output.path()));
        assert!(report.abandoned.is_empty());
        assert_eq!(
            report.saved,
            vec![
                report.directory.join("big.bin"),
                report.directory.join("note.txt"),
            ]
        );
        assert_eq!(fs::read(&report.saved[0]).unwrap(), content);
        assert_eq!(fs::read(&report.saved[1]).unwrap(), b"hello");
    }
}
