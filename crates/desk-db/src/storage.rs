//! Uploaded file storage
//!
//! Files are stored under `upload_to` (e.g. `document/`) below the media
//! root. Names are transliterated to ASCII and made unique before writing.

use async_trait::async_trait;
use desk_core::{DeskError, DeskResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const TRANSLIT_TABLE: &[(char, &str)] = &[
	('‘', "'"),
	('’', "'"),
	('«', "\""),
	('»', "\""),
	('“', "\""),
	('”', "\""),
	('–', "-"),
	('—', "-"),
	('‒', "-"),
	('−', "-"),
	('…', "..."),
	('№', "#"),
	('А', "A"),
	('Б', "B"),
	('В', "V"),
	('Г', "G"),
	('Д', "D"),
	('Е', "E"),
	('Ё', "E"),
	('Ж', "ZH"),
	('З', "Z"),
	('И', "I"),
	('Й', "I"),
	('К', "K"),
	('Л', "L"),
	('М', "M"),
	('Н', "N"),
	('О', "O"),
	('П', "P"),
	('Р', "R"),
	('С', "S"),
	('Т', "T"),
	('У', "U"),
	('Ф', "F"),
	('Х', "KH"),
	('Ц', "TS"),
	('Ч', "CH"),
	('Ш', "SH"),
	('Щ', "SHCH"),
	('Ъ', "IE"),
	('Ы', "Y"),
	('Ь', ""),
	('Э', "E"),
	('Ю', "IU"),
	('Я', "IA"),
	('а', "a"),
	('б', "b"),
	('в', "v"),
	('г', "g"),
	('д', "d"),
	('е', "e"),
	('ё', "e"),
	('ж', "zh"),
	('з', "z"),
	('и', "i"),
	('й', "i"),
	('к', "k"),
	('л', "l"),
	('м', "m"),
	('н', "n"),
	('о', "o"),
	('п', "p"),
	('р', "r"),
	('с', "s"),
	('т', "t"),
	('у', "u"),
	('ф', "f"),
	('х', "kh"),
	('ц', "ts"),
	('ч', "ch"),
	('ш', "sh"),
	('щ', "shch"),
	('ъ', "ie"),
	('ы', "y"),
	('ь', ""),
	('э', "e"),
	('ю', "iu"),
	('я', "ia"),
];

/// Replace Cyrillic letters and typographic punctuation with ASCII
///
/// # Examples
///
/// ```
/// use desk_db::storage::translit;
///
/// assert_eq!(translit("Договор №5 — «Мир»"), "Dogovor #5 - \"Mir\"");
/// ```
pub fn translit(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match TRANSLIT_TABLE.iter().find(|(from, _)| *from == c) {
			Some((_, to)) => out.push_str(to),
			None => out.push(c),
		}
	}
	out
}

/// Safe file name: transliterated, spaces to `_`, only `[-\w.]` kept
pub fn valid_filename(name: &str) -> String {
	let base = Path::new(name)
		.file_name()
		.and_then(|n| n.to_str())
		.unwrap_or_default();
	let cleaned: String = translit(base.trim())
		.replace(' ', "_")
		.chars()
		.filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
		.collect();
	match cleaned.trim_matches('.') {
		"" => "file".to_string(),
		_ => cleaned,
	}
}

fn split_extension(name: &str) -> (&str, &str) {
	match name.rfind('.') {
		Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
		_ => (name, ""),
	}
}

/// Storage-relative path that never leaves the root
fn checked_relative(name: &str) -> DeskResult<&Path> {
	let path = Path::new(name);
	let safe = path
		.components()
		.all(|component| matches!(component, Component::Normal(_)));
	if name.is_empty() || !safe {
		return Err(DeskError::NotFound(format!("File '{}' does not exist", name)));
	}
	Ok(path)
}

#[async_trait]
pub trait Storage: Send + Sync {
	/// Store `content` under `upload_to`, returning the stored relative path
	async fn save(&self, upload_to: &str, filename: &str, content: &[u8]) -> DeskResult<String>;

	async fn open(&self, name: &str) -> DeskResult<Vec<u8>>;

	/// Remove a stored file; a missing file is not an error
	async fn delete(&self, name: &str) -> DeskResult<()>;

	async fn exists(&self, name: &str) -> DeskResult<bool>;
}

/// Files on the local file system below a media root
#[derive(Debug, Clone)]
pub struct LocalStorage {
	base_path: PathBuf,
}

impl LocalStorage {
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		Self {
			base_path: base_path.into(),
		}
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}

	fn get_path(&self, name: &str) -> DeskResult<PathBuf> {
		Ok(self.base_path.join(checked_relative(name)?))
	}
}

#[async_trait]
impl Storage for LocalStorage {
	async fn save(&self, upload_to: &str, filename: &str, content: &[u8]) -> DeskResult<String> {
		let directory = upload_to.trim_matches('/');
		let filename = valid_filename(filename);
		let (stem, extension) = split_extension(&filename);

		let mut candidate = format!("{}/{}", directory, filename);
		let mut counter = 1;
		while fs::try_exists(self.get_path(&candidate)?).await? {
			candidate = format!("{}/{}_{}{}", directory, stem, counter, extension);
			counter += 1;
		}

		let path = self.get_path(&candidate)?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}
		fs::write(&path, content).await?;
		tracing::info!(file = %candidate, bytes = content.len(), "Stored upload");
		Ok(candidate)
	}

	async fn open(&self, name: &str) -> DeskResult<Vec<u8>> {
		let path = self.get_path(name)?;
		if !fs::try_exists(&path).await? {
			return Err(DeskError::NotFound(format!("File '{}' does not exist", name)));
		}
		Ok(fs::read(&path).await?)
	}

	async fn delete(&self, name: &str) -> DeskResult<()> {
		let path = self.get_path(name)?;
		match fs::remove_file(&path).await {
			Ok(()) => {
				tracing::info!(file = %name, "Removed stored file");
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}

	async fn exists(&self, name: &str) -> DeskResult<bool> {
		Ok(fs::try_exists(self.get_path(name)?).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tempfile::TempDir;

	#[rstest]
	#[case("Акт сверки.pdf", "Akt_sverki.pdf")]
	#[case("../../etc/passwd", "passwd")]
	#[case("отчёт (итог).docx", "otchet_itog.docx")]
	#[case("...", "file")]
	fn test_valid_filename(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(valid_filename(raw), expected);
	}

	#[tokio::test]
	async fn test_save_makes_names_unique() {
		let dir = TempDir::new().unwrap();
		let storage = LocalStorage::new(dir.path());

		let first = storage.save("document/", "Письмо.pdf", b"one").await.unwrap();
		let second = storage.save("document/", "Письмо.pdf", b"two").await.unwrap();

		assert_eq!(first, "document/Pismo.pdf");
		assert_eq!(second, "document/Pismo_1.pdf");
		assert_eq!(storage.open(&second).await.unwrap(), b"two");
	}

	#[tokio::test]
	async fn test_delete_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let storage = LocalStorage::new(dir.path());
		let name = storage.save("document", "a.txt", b"x").await.unwrap();

		storage.delete(&name).await.unwrap();
		assert!(!storage.exists(&name).await.unwrap());
		storage.delete(&name).await.unwrap();
	}

	#[tokio::test]
	async fn test_paths_outside_root_are_rejected() {
		let dir = TempDir::new().unwrap();
		let storage = LocalStorage::new(dir.path());
		assert!(matches!(
			storage.open("../secret").await,
			Err(DeskError::NotFound(_))
		));
	}
}
