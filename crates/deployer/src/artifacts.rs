//! Truffle-style contract artifacts: the opaque ABI plus creation bytecode
//! referenced by plan steps.

use {
    alloy::primitives::Bytes,
    anyhow::{Context, Result, bail},
    serde::Deserialize,
    std::path::Path,
};

/// An ABI and creation bytecode pair loaded from `<dir>/<name>.json`.
///
/// The ABI is carried as an opaque JSON document. Nothing in this crate
/// interprets it beyond what constructor-argument encoding requires.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub abi: serde_json::Value,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct RawArtifact {
    abi: serde_json::Value,
    bytecode: String,
}

impl Artifact {
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        let raw: RawArtifact = serde_json::from_str(&contents)
            .with_context(|| format!("malformed artifact {}", path.display()))?;
        let bytecode: Bytes = raw
            .bytecode
            .parse()
            .with_context(|| format!("malformed bytecode in artifact {}", path.display()))?;
        if bytecode.is_empty() {
            bail!("artifact {name} has no creation bytecode, is it an interface?");
        }
        Ok(Self {
            name: name.to_string(),
            abi: raw.abi,
            bytecode,
        })
    }
}
