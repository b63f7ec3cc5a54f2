//! # Artifacts
//!
//! Every run leaves up to three files in the output directory, all named after
//! the local time the run started:
//!
//! ```text
//! output/
//!   20241019-142301_request.json   written as soon as the job id is known
//!   20241019-142301_result.json    final status document
//!   20241019-142301_result.jpg     image bytes
//! ```
//!
//! The JSON files are pretty printed with four spaces of indentation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use color_eyre::Result;
use log::debug;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::{FluxError, request::GenerationRequest, service::PollResponse};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone)]
pub struct ArtifactSet {
    dir: PathBuf,
    stamp: String,
}

impl ArtifactSet {
    pub fn new(dir: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            stamp: started.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn request_path(&self) -> PathBuf {
        self.file("request", "json")
    }

    pub fn result_path(&self) -> PathBuf {
        self.file("result", "json")
    }

    pub fn image_path(&self) -> PathBuf {
        self.file("result", "jpg")
    }

    pub fn write_request(&self, request: &GenerationRequest) -> Result<PathBuf> {
        let path = self.request_path();
        self.write(&path, to_pretty_json(request)?.as_bytes())?;
        Ok(path)
    }

    pub fn write_result(&self, result: &PollResponse) -> Result<PathBuf> {
        let path = self.result_path();
        self.write(&path, to_pretty_json(result)?.as_bytes())?;
        Ok(path)
    }

    pub fn write_image(&self, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.image_path();
        self.write(&path, bytes)?;
        Ok(path)
    }

    fn file(&self, kind: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}_{kind}.{extension}", self.stamp))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| FluxError::io(&self.dir, e))?;
            println!("Created directory: {}", self.dir.display());
        }
        fs::write(path, contents).map_err(|e| FluxError::io(path, e))?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}

/// JSON with four space indentation, non-ASCII text kept as is
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}
