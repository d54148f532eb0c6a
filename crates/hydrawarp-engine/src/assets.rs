use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::protocol::ShaderAsset;

/// Shader asset folders, relative to the assets root. Provisioned in this order.
pub const SHADER_DIRS: [&str; 3] = ["glsl", "glsl/received", "glsl/processed"];

/// A validated root directory containing hydrawarp runtime assets (JSON + shaders).
#[derive(Debug, Clone)]
pub struct AssetsRoot {
    path: PathBuf,
}

impl AssetsRoot {
    /// Locate the `assets/` directory.
    ///
    /// Resolution order:
    /// 1) `HYDRAWARP_ASSETS` env var (if set and existing)
    /// 2) Search upward from `start_dir` for a folder named `assets`
    pub fn discover(start_dir: &Path) -> Result<Self, EngineError> {
        if let Ok(p) = std::env::var("HYDRAWARP_ASSETS") {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Ok(Self { path: pb });
            }
        }

        let mut cur = start_dir.to_path_buf();
        loop {
            let cand = cur.join("assets");
            if cand.is_dir() {
                return Ok(Self { path: cand });
            }
            if !cur.pop() {
                break;
            }
        }

        Err(EngineError::AssetsNotFound {
            start_dir: start_dir.to_path_buf(),
        })
    }

    /// Use `path` as the assets root, creating it if needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| EngineError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    /// Choose OS-specific JSON config if present, otherwise fall back to `<stem>.json`.
    ///
    /// Example: `channel.macos.json` overrides `channel.json` on macOS.
    pub fn pick_platform_json(&self, stem: &str) -> PathBuf {
        pick_platform_json(&self.path, stem)
    }
}

/// Create-if-absent service for asset folders.
///
/// The channel calls this for every accepted shader header; implementations must be idempotent.
pub trait AssetProvisioner {
    fn ensure_dir(&mut self, rel: &str) -> Result<(), EngineError>;
}

impl AssetProvisioner for AssetsRoot {
    fn ensure_dir(&mut self, rel: &str) -> Result<(), EngineError> {
        let dir = self.join(rel);
        if dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::Io { path: dir, source: e })
    }
}

/// Provision `glsl`, `glsl/received` and `glsl/processed`, each requested once.
pub fn ensure_shader_dirs(provisioner: &mut dyn AssetProvisioner) -> Result<(), EngineError> {
    for rel in SHADER_DIRS {
        provisioner.ensure_dir(rel)?;
    }
    Ok(())
}

/// Choose OS-specific JSON config if present, otherwise fall back to `<stem>.json`.
pub fn pick_platform_json(assets: &Path, stem: &str) -> PathBuf {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "other"
    };

    let platform = assets.join(format!("{stem}.{os}.json"));
    if platform.exists() {
        platform
    } else {
        assets.join(format!("{stem}.json"))
    }
}

/// Read a UTF-8 file into a String (Result-based).
pub fn read_to_string_result(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Turn a received shader title into a file stem.
///
/// Titles come off the wire, so anything that could escape the shader folders is rejected.
pub fn shader_file_stem(title: &str) -> Result<String, EngineError> {
    let stem = title.trim();
    let bad = stem.is_empty()
        || stem == "."
        || stem.contains("..")
        || stem.chars().any(|c| matches!(c, '/' | '\\' | ':' | '\0'));
    if bad {
        return Err(EngineError::InvalidAssetName {
            title: title.to_string(),
        });
    }
    Ok(stem.to_string())
}

/// Files written for one received shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenShader {
    /// `glsl/received/<title>.glsl`, only when the shader had no uniform declarations.
    pub received: Option<PathBuf>,
    /// `glsl/processed/<title>.frag`
    pub processed: PathBuf,
}

/// Persist a received shader asset under the assets root.
///
/// Shaders without uniform declarations are kept as received (`.glsl`) and their processed
/// `.frag` gets the shadertoy include spliced in after the header.
pub fn write_shader_asset(root: &AssetsRoot, asset: &ShaderAsset) -> Result<WrittenShader, EngineError> {
    let stem = shader_file_stem(&asset.title)?;

    let received = if asset.has_uniforms {
        None
    } else {
        let p = root.join("glsl").join("received").join(format!("{stem}.glsl"));
        write_file(&p, &asset.raw_text)?;
        Some(p)
    };

    let processed = root.join("glsl").join("processed").join(format!("{stem}.frag"));
    write_file(&processed, &asset.processed_content())?;

    Ok(WrittenShader { received, processed })
}

fn write_file(path: &Path, contents: &str) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, contents).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
