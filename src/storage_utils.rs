use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the directory everything is read from / written to
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Uses `dir` as-is and creates it if needed.
    pub async fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let base_dir = dir.as_ref().to_path_buf();

        // Created once here so saves never have to check for the folder.
        if !fs::try_exists(&base_dir).await.unwrap_or(false) {
            fs::create_dir_all(&base_dir).await?;
        }

        Ok(Self { base_dir })
    }

    /// Resolves `relative_path` against the directory of the running executable.
    /// Absolute paths are used unchanged.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let relative_path = relative_path.as_ref();
        if relative_path.is_absolute() {
            return Self::new(relative_path).await;
        }

        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    pub async fn contains(&self, filename: &str) -> bool {
        fs::try_exists(self.json_path(filename)).await.unwrap_or(false)
    }

    /// Serializes `data` to pretty JSON in `<filename>.json`.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let json_bytes = serde_json::to_vec_pretty(data)?;
        self.write_atomic(&format!("{}.json", filename), &json_bytes).await?;
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates the bytes while parsing, no need for read_to_string.
        let content = fs::read(self.json_path(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Writes raw bytes under the exact `file_name` and returns the final path.
    pub async fn save_bytes(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        self.write_atomic(file_name, bytes).await
    }

    // Write to `<name>.tmp` then rename, so a crash mid-write leaves the old file intact.
    async fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let final_path = self.base_dir.join(file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        fs::write(&tmp_path, bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        Ok(final_path)
    }

    fn json_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }
}
