//! The on-disk config document (spec §6): blockchain/network selection,
//! project (pub/sub topic) name, our own identity, the wallet map, and a
//! last-updated timestamp. Grounded in `config/config.go`'s `AppConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use thresher_party::Me;
use thresher_wallet::WalletRecord;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blockchain {
    #[serde(rename = "avalanche")]
    Avalanche,
    #[serde(rename = "ethereum")]
    Ethereum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "mainnet")]
    Mainnet,
    #[serde(rename = "fuji")]
    Fuji,
    #[serde(rename = "goerli")]
    Goerli,
}

impl Blockchain {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "avalanche" => Ok(Blockchain::Avalanche),
            "ethereum" => Ok(Blockchain::Ethereum),
            other => Err(AppError::Config(format!("unsupported blockchain '{other}'"))),
        }
    }
}

impl Network {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "fuji" => Ok(Network::Fuji),
            "goerli" => Ok(Network::Goerli),
            other => Err(AppError::Config(format!("unsupported network '{other}'"))),
        }
    }
}

/// Validate that a (blockchain, network) pairing makes sense, matching
/// `config.go`'s `errUnsupportedBlockchain` check, generalized to cover the
/// account-chain variant the original didn't support.
fn validate_pair(blockchain: Blockchain, network: Network) -> Result<(), AppError> {
    match (blockchain, network) {
        (Blockchain::Avalanche, Network::Mainnet | Network::Fuji) => Ok(()),
        (Blockchain::Ethereum, Network::Mainnet | Network::Goerli) => Ok(()),
        _ => Err(AppError::Config(format!("{blockchain:?}/{network:?} is unsupported"))),
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    pub blockchain: Blockchain,
    pub network: Network,
    /// The pub/sub topic name.
    pub project: String,
    pub me: Me,
    #[serde(default)]
    pub wallets: HashMap<String, WalletRecord>,
    pub updated_at: String,

    #[serde(skip)]
    filename: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(blockchain: &str, network: &str, project: impl Into<String>, nick: impl Into<String>, address: impl Into<String>) -> Result<Self, AppError> {
        let blockchain = Blockchain::parse(blockchain)?;
        let network = Network::parse(network)?;
        validate_pair(blockchain, network)?;

        Ok(Self {
            blockchain,
            network,
            project: project.into(),
            me: Me::generate(nick, address),
            wallets: HashMap::new(),
            updated_at: now_iso8601(),
            filename: None,
        })
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Load from an existing file on disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| AppError::Config(format!("reading config file {}: {e}", path.display())))?;
        let mut cfg: AppConfig = serde_json::from_slice(&bytes).map_err(|e| AppError::Config(format!("parsing config file {}: {e}", path.display())))?;
        cfg.filename = Some(path.to_path_buf());
        Ok(cfg)
    }

    /// Save to `path` for the first time; errors if a file is already there
    /// (matches `config.go`'s `Save`, which refuses to overwrite).
    pub async fn save_new(&mut self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let path = path.as_ref();
        if tokio::fs::metadata(path).await.is_ok() {
            return Err(AppError::Config(format!("config file {} already exists", path.display())));
        }
        self.filename = Some(path.to_path_buf());
        self.persist().await
    }

    /// Write the current config back to disk atomically: write to a temp
    /// file in the same directory, fsync, rename, chmod 0600. Grounded in
    /// `config.go`'s `Persist`/`write`, adapted from the original's plain
    /// `os.Create` to the atomic-rename idiom since this file holds secret
    /// key material and a torn write must never be observable.
    pub async fn persist(&mut self) -> Result<(), AppError> {
        let path = self.filename.clone().ok_or_else(|| AppError::Config("config has no associated filename".into()))?;
        self.updated_at = now_iso8601();

        let bytes = serde_json::to_vec_pretty(&self).map_err(|e| AppError::Config(format!("serializing config: {e}")))?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(".{}.tmp", path.file_name().and_then(|n| n.to_str()).unwrap_or("thresher-config")));

        write_atomic(&tmp_path, &path, &bytes).await?;
        Ok(())
    }

    pub fn add_wallet(&mut self, record: WalletRecord) {
        self.wallets.insert(record.name.clone(), record);
    }

    pub fn find_wallet(&self, name: &str) -> Option<&WalletRecord> {
        self.wallets.get(name)
    }

    pub fn sorted_wallet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wallets.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn rename_wallet(&mut self, old_name: &str, new_name: &str) -> Result<(), AppError> {
        if self.wallets.contains_key(new_name) {
            return Err(AppError::Config("cannot rename wallet, new name already exists".into()));
        }
        if let Some(mut record) = self.wallets.remove(old_name) {
            record.name = new_name.to_string();
            self.wallets.insert(new_name.to_string(), record);
        }
        Ok(())
    }
}

async fn write_atomic(tmp_path: &Path, final_path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    let mut file = tokio::fs::File::create(tmp_path).await?;
    tokio::io::AsyncWriteExt::write_all(&mut file, bytes).await?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp_path, final_path).await?;
    Ok(())
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_rejects_unsupported_pairings() {
        let err = AppConfig::new("avalanche", "goerli", "proj", "alice", "X-fuji1abc").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn persists_and_reloads_with_permissions_0600() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj-alice.json");

        let mut cfg = AppConfig::new("avalanche", "fuji", "proj", "alice", "X-fuji1abc").unwrap();
        cfg.save_new(&path).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }

        let reloaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(reloaded.project, "proj");
        assert_eq!(reloaded.me.participant.nick, "alice");
    }

    #[tokio::test]
    async fn save_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj-bob.json");

        let mut cfg = AppConfig::new("avalanche", "fuji", "proj", "bob", "X-fuji1def").unwrap();
        cfg.save_new(&path).await.unwrap();

        let mut cfg2 = AppConfig::new("avalanche", "fuji", "proj", "bob2", "X-fuji1ghi").unwrap();
        let err = cfg2.save_new(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn wallet_rename_rejects_collisions() {
        let mut cfg = AppConfig::new("avalanche", "fuji", "proj", "alice", "X-fuji1abc").unwrap();
        cfg.add_wallet(WalletRecord {
            name: "a".into(),
            threshold: 1,
            me: cfg.me.participant.clone(),
            others: vec![],
            key_data: None,
            public_key_sec1: None,
            address: None,
            created_at: now_iso8601(),
        });
        cfg.add_wallet(WalletRecord {
            name: "b".into(),
            threshold: 1,
            me: cfg.me.participant.clone(),
            others: vec![],
            key_data: None,
            public_key_sec1: None,
            address: None,
            created_at: now_iso8601(),
        });

        assert!(cfg.rename_wallet("a", "b").is_err());
        assert!(cfg.rename_wallet("a", "c").is_ok());
        assert!(cfg.find_wallet("c").is_some());
    }
}
