//! Opaque resumption tokens exchanged with the caller.

// self
use crate::{_prelude::*, endpoints::DirectoryEndpoints, error::CheckpointError};

/// UTF-8 bytes of the next page's absolute URL.
///
/// An absent or empty checkpoint means "start of collection" on input and "enumeration
/// complete" on output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Checkpoint(Vec<u8>);
impl Checkpoint {
	/// Wraps a next-page link exactly as the directory returned it.
	pub fn from_link(link: &str) -> Self {
		Self(link.as_bytes().to_vec())
	}

	/// Raw bytes to hand back on the next call.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Consumes the checkpoint into its raw bytes.
	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}

	/// Decodes caller-supplied bytes into the page URL they stand for.
	///
	/// The URL must be absolute and belong to the configured graph origin.
	pub fn decode(bytes: &[u8], endpoints: &DirectoryEndpoints) -> Result<Url, CheckpointError> {
		let text = std::str::from_utf8(bytes).map_err(|_| CheckpointError::NotUtf8)?;
		let url = Url::parse(text)
			.map_err(|source| CheckpointError::NotUrl { text: text.to_owned(), source })?;

		if !endpoints.is_graph_origin(&url) {
			return Err(CheckpointError::ForeignOrigin {
				url: url.to_string(),
				expected: endpoints.graph_origin(),
			});
		}

		Ok(url)
	}
}
impl AsRef<[u8]> for Checkpoint {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}
impl From<Checkpoint> for Vec<u8> {
	fn from(value: Checkpoint) -> Self {
		value.0
	}
}
impl Debug for Checkpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Checkpoint").field(&String::from_utf8_lossy(&self.0)).finish()
	}
}
