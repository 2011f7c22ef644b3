use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use sky_crypto::{encrypt_preamble, FileKey, Skykey};
use sky_erasure::{sector_root, RsCoder};
use sky_format::{
    encode_base_sector, encrypt_base_sector, sniff_content_type, CipherType, Fanout, FormatError, Layout, Metadata,
    Skylink, SubfileMetadata, LAYOUT_LEN,
};
use sky_primitives::{Blocklist, Hash, RequestBudget, SkyError, SECTOR_SIZE};
use sky_provider::ProviderClient;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::dispatch::write_sector_to_quorum;
use crate::error::UploadResult;
use crate::large::{chunk_roots_locally, upload_chunk};
use crate::small::build_sector_with_metadata;

/// Generous upper bound on a single-file metadata JSON blob, reserved out of
/// the small-file budget so the size classification doesn't need to encode
/// the real metadata just to decide which path to take.
const METADATA_RESERVE: usize = 1024;

/// One file of a directory upload: its root-relative path and full contents.
pub struct SubfileInput {
    pub path: String,
    pub content: Vec<u8>,
}

/// Everything about a requested upload except the byte stream itself.
pub struct UploadParams {
    pub filename: String,
    pub skykey: Option<Skykey>,
    pub data_pieces: u8,
    pub parity_pieces: u8,
    pub base_chunk_redundancy: usize,
    /// Run the full pipeline and report the resulting skylink, but never
    /// write sectors to providers.
    pub dry_run: bool,
    /// When set (and non-empty), this is a directory upload: every entry
    /// becomes a subfile, packed back to back in the order given behind a
    /// single base sector and fanout. The byte stream otherwise passed to
    /// [`upload_skyfile`] is ignored.
    pub subfiles: Option<Vec<SubfileInput>>,
    /// Root-relative path served when a directory is requested without one.
    /// Only meaningful (and only valid) on a directory upload.
    pub default_path: Option<String>,
    /// Disables the default-path fallback (lone subfile, then
    /// `/index.html`) for a directory upload with no `default_path` set.
    pub disable_default_path: bool,
}

/// A binding from a human-readable path to a skylink, checked and updated
/// atomically around an upload that names `force: true`.
///
/// Collaborators implement this against whatever path-registry layer they
/// keep above the storage core; uploads that don't target a named path skip
/// it entirely.
pub trait PathBinder: Send + Sync {
    fn existing(&self, sia_path: &str) -> Option<Skylink>;
    fn bind(&self, sia_path: &str, skylink: Skylink) -> UploadResult<()>;
}

/// The result of a completed (or dry-run) upload.
pub struct UploadOutcome {
    pub skylink: Skylink,
    pub file_size: u64,
}

/// How a skyfile's metadata gets built once the size classification (and,
/// for a streamed single file, the total length) is known.
enum SkyfileSpec {
    /// A single file: metadata is built from its sniffed content type and
    /// final length once both are known.
    SingleFile,
    /// A directory: the subfile table is already fully resolved, since
    /// directory uploads assemble their content in memory up front.
    Directory(Metadata),
}

impl SkyfileSpec {
    fn resolve(&self, filename: &str, content_type: Option<&str>, len: u64) -> Metadata {
        match self {
            SkyfileSpec::SingleFile => {
                let content_type = content_type.unwrap_or("application/octet-stream");
                Metadata::single_file_with_subfile(filename, content_type, len)
            }
            SkyfileSpec::Directory(metadata) => metadata.clone(),
        }
    }
}

fn map_metadata_error(context: &'static str, err: FormatError) -> SkyError {
    match err {
        FormatError::DefaultPathInvalid => SkyError::DefaultPathInvalid { context },
        FormatError::DefaultPathOnSingleFile => SkyError::DefaultPathOnSingleFile { context },
        FormatError::DefaultPathAndDisableBothSet => SkyError::DefaultPathAndDisableBothSet { context },
        FormatError::DefaultPathNonRoot => SkyError::DefaultPathNonRoot { context },
        _ => SkyError::MetadataTooBig { context },
    }
}

/// Packs a directory upload's subfiles back to back into one blob, recording
/// each one's offset, sniffed content type, and length in the subfile table.
fn assemble_directory(subfiles: &[SubfileInput], params: &UploadParams) -> UploadResult<(Vec<u8>, Metadata)> {
    let mut content = Vec::new();
    let mut table = BTreeMap::new();

    for subfile in subfiles {
        let offset = content.len() as u64;
        let content_type = sniff_content_type(&subfile.content);
        content.extend_from_slice(&subfile.content);
        table.insert(
            subfile.path.clone(),
            SubfileMetadata {
                filename: subfile.path.clone(),
                content_type,
                offset,
                len: subfile.content.len() as u64,
            },
        );
    }

    let metadata = Metadata {
        filename: params.filename.clone(),
        subfiles: table,
        default_path: params.default_path.clone(),
        disable_default_path: params.disable_default_path,
    };
    metadata
        .validate()
        .map_err(|e| map_metadata_error("upload_skyfile", e))?;

    Ok((content, metadata))
}

/// Uploads a byte stream as a skyfile: classifies it as small or large by
/// sampling up to the base sector's inline budget, assembles the base
/// sector (erasure-coding and dispatching fanout chunks for large files),
/// and binds it to `sia_path` through `path_binder` when one is named.
///
/// When `params.subfiles` names a non-empty directory, `reader` is ignored
/// and the subfiles' concatenated bytes are uploaded instead.
///
/// `force` controls what happens when `sia_path` is already bound: without
/// it, a pre-existing binding fails with `AlreadyExists`; with it, the
/// binding is replaced once the new upload's quorum is met.
#[allow(clippy::too_many_arguments)]
pub async fn upload_skyfile<R: AsyncRead + Unpin>(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    reader: R,
    params: UploadParams,
    path_binder: Option<(&str, bool, &dyn PathBinder)>,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<UploadOutcome> {
    if let Some((sia_path, force, binder)) = path_binder {
        if !force && binder.existing(sia_path).is_some() {
            return Err(SkyError::AlreadyExists {
                context: "upload_skyfile",
            });
        }
    }

    let outcome = match params.subfiles.as_ref().filter(|s| !s.is_empty()) {
        Some(subfiles) => {
            let (content, metadata) = assemble_directory(subfiles, &params)?;
            run_pipeline(providers, blocklist, content.as_slice(), SkyfileSpec::Directory(metadata), &params, budget, cancel).await?
        }
        None => run_pipeline(providers, blocklist, reader, SkyfileSpec::SingleFile, &params, budget, cancel).await?,
    };

    if let Some((sia_path, _, binder)) = path_binder {
        if !params.dry_run {
            binder.bind(sia_path, outcome.skylink)?;
        }
    }

    Ok(outcome)
}

async fn run_pipeline<R: AsyncRead + Unpin>(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    mut reader: R,
    spec: SkyfileSpec,
    params: &UploadParams,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<UploadOutcome> {
    let small_budget = SECTOR_SIZE - LAYOUT_LEN - METADATA_RESERVE;
    let mut head = Vec::new();
    (&mut reader)
        .take((small_budget + 1) as u64)
        .read_to_end(&mut head)
        .await
        .map_err(|_| SkyError::InvalidPath {
            context: "upload_skyfile",
        })?;

    if head.len() <= small_budget {
        upload_small(providers, blocklist, &head, &spec, params, budget, cancel).await
    } else {
        upload_large(providers, blocklist, reader, head, &spec, params, budget, cancel).await
    }
}

async fn upload_small(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    content: &[u8],
    spec: &SkyfileSpec,
    params: &UploadParams,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<UploadOutcome> {
    let content_type = matches!(spec, SkyfileSpec::SingleFile).then(|| sniff_content_type(content));
    let metadata = spec.resolve(&params.filename, content_type.as_deref(), content.len() as u64);
    let sector = build_sector_with_metadata(metadata, content, params.skykey.as_ref())?;
    let root = if params.dry_run {
        sector_root(&sector)
    } else {
        write_sector_to_quorum(
            providers,
            blocklist,
            &sector,
            params.base_chunk_redundancy,
            budget,
            cancel,
        )
        .await?
    };

    Ok(UploadOutcome {
        skylink: Skylink::whole_sector(1, root).map_err(|_| SkyError::InvalidSkylink {
            context: "upload_skyfile",
        })?,
        file_size: content.len() as u64,
    })
}

#[allow(clippy::too_many_arguments)]
async fn upload_large<R: AsyncRead + Unpin>(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    mut reader: R,
    head: Vec<u8>,
    spec: &SkyfileSpec,
    params: &UploadParams,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<UploadOutcome> {
    // A single data piece carries the whole chunk on its own, so configured
    // parity buys nothing: its roots would never be addressable for repair
    // since only one root gets recorded per chunk. Drop it rather than pay
    // to erasure-code and store pieces that can never be read back.
    let effective_parity_pieces = if params.data_pieces == 1 { 0 } else { params.parity_pieces };

    let coder = RsCoder::new(params.data_pieces as usize, effective_parity_pieces as usize).map_err(|_| {
        SkyError::InvalidPath {
            context: "upload_skyfile",
        }
    })?;
    let chunk_len = coder.data_pieces() * SECTOR_SIZE;

    let content_type = matches!(spec, SkyfileSpec::SingleFile).then(|| sniff_content_type(&head));

    let file_key = params.skykey.as_ref().map(|_| {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        FileKey::new(bytes)
    });
    let fanout_key = file_key.as_ref().map(FileKey::derive_fanout_key);

    let mut fanout = Fanout::new(coder.data_pieces() + coder.parity_pieces());
    let mut total_len = 0u64;
    let mut chunk_buf = head;
    let mut chunk_index = 0u64;

    loop {
        while chunk_buf.len() < chunk_len {
            let mut tmp = vec![0u8; chunk_len - chunk_buf.len()];
            let n = reader.read(&mut tmp).await.map_err(|_| SkyError::InvalidPath {
                context: "upload_skyfile",
            })?;
            if n == 0 {
                break;
            }
            chunk_buf.extend_from_slice(&tmp[..n]);
        }

        let is_final = chunk_buf.len() < chunk_len;
        total_len += chunk_buf.len() as u64;
        let mut padded = chunk_buf.clone();
        padded.resize(chunk_len, 0);

        let piece_roots = if params.dry_run {
            chunk_roots_locally(&coder, fanout_key.as_ref(), chunk_index, &padded)
        } else {
            upload_chunk(
                providers,
                blocklist,
                &coder,
                fanout_key.as_ref(),
                chunk_index,
                &padded,
                params.base_chunk_redundancy,
                budget,
                cancel,
            )
            .await?
        };
        fanout.push_chunk(piece_roots).map_err(|_| SkyError::InvalidPath {
            context: "upload_skyfile",
        })?;

        if is_final {
            break;
        }
        chunk_index += 1;
        chunk_buf = Vec::new();
    }

    let metadata = spec.resolve(&params.filename, content_type.as_deref(), total_len);

    let root = assemble_and_dispatch_base_sector(
        providers,
        blocklist,
        &metadata,
        total_len,
        &fanout,
        coder.data_pieces() as u8,
        coder.parity_pieces() as u8,
        file_key.as_ref(),
        params.skykey.as_ref(),
        params.base_chunk_redundancy,
        params.dry_run,
        budget,
        cancel,
    )
    .await?;

    Ok(UploadOutcome {
        skylink: Skylink::whole_sector(1, root).map_err(|_| SkyError::InvalidSkylink {
            context: "upload_skyfile",
        })?,
        file_size: total_len,
    })
}

#[allow(clippy::too_many_arguments)]
async fn assemble_and_dispatch_base_sector(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    metadata: &Metadata,
    file_size: u64,
    fanout: &Fanout,
    data_pieces: u8,
    parity_pieces: u8,
    file_key: Option<&FileKey>,
    skykey: Option<&Skykey>,
    redundancy: usize,
    dry_run: bool,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<Hash> {
    let metadata_bytes = metadata.encode().map_err(|_| SkyError::MetadataTooBig {
        context: "assemble_and_dispatch_base_sector",
    })?;
    let fanout_bytes = fanout.encode();

    let mut layout = Layout {
        file_size,
        metadata_size: metadata_bytes.len() as u32,
        fanout_size: fanout_bytes.len() as u32,
        fanout_data_pieces: data_pieces,
        fanout_parity_pieces: parity_pieces,
        cipher_type: CipherType::Plain,
        key_data: [0u8; 64],
    };

    if let (Some(skykey), Some(file_key)) = (skykey, file_key) {
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        layout.cipher_type = CipherType::Aes256Ctr;
        layout.key_data = encrypt_preamble(skykey, file_key, nonce);
    }

    let mut sector = encode_base_sector(&layout, &fanout_bytes, &metadata_bytes, &[]).map_err(|_| {
        SkyError::MetadataTooBig {
            context: "assemble_and_dispatch_base_sector",
        }
    })?;

    if let Some(file_key) = file_key {
        encrypt_base_sector(&mut sector, file_key);
    }

    if dry_run {
        Ok(sector_root(&sector))
    } else {
        write_sector_to_quorum(providers, blocklist, &sector, redundancy, budget, cancel).await
    }
}
