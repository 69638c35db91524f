//! Byte views over keys and values.

use bytes::Bytes;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// A view over a contiguous run of bytes.
///
/// A view either borrows memory owned by someone else (an iterator, a
/// caller's buffer) or holds a reference-counted [`Bytes`] buffer. The
/// borrowed form cannot outlive its owner: an iterator's `key()` borrows the
/// iterator, so the borrow checker rejects use after `advance()`. Call
/// [`ByteView::to_vec`] or [`ByteView::into_bytes`] to keep the data longer.
///
/// The bytes are opaque; no encoding is assumed.
///
/// # Example
///
/// ```rust
/// use kvseam_core::ByteView;
///
/// let view = ByteView::from("sample");
/// assert_eq!(view.len(), 6);
/// assert_eq!(view.to_string_lossy(), "sample");
/// ```
#[derive(Clone)]
pub struct ByteView<'a> {
    repr: Repr<'a>,
}

#[derive(Clone)]
enum Repr<'a> {
    Borrowed(&'a [u8]),
    Shared(Bytes),
}

impl<'a> ByteView<'a> {
    /// Views borrowed bytes without copying.
    #[must_use]
    pub const fn borrowed(bytes: &'a [u8]) -> Self {
        Self {
            repr: Repr::Borrowed(bytes),
        }
    }

    /// Returns the viewed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Borrowed(bytes) => bytes,
            Repr::Shared(bytes) => bytes,
        }
    }

    /// Number of bytes in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether the view holds a shared owning buffer.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self.repr, Repr::Shared(_))
    }

    /// Copies the bytes into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Copies the bytes into a string, replacing invalid UTF-8.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Converts into an owning buffer. Shared views are returned without
    /// copying; borrowed views are copied.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self.repr {
            Repr::Borrowed(bytes) => Bytes::copy_from_slice(bytes),
            Repr::Shared(bytes) => bytes,
        }
    }

    /// Detaches the view from whatever it borrows.
    #[must_use]
    pub fn into_owned(self) -> ByteView<'static> {
        ByteView::from(self.into_bytes())
    }
}

impl Default for ByteView<'_> {
    fn default() -> Self {
        Self::borrowed(&[])
    }
}

impl Deref for ByteView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::borrowed(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteView<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Self::borrowed(bytes)
    }
}

impl<'a> From<&'a str> for ByteView<'a> {
    fn from(text: &'a str) -> Self {
        Self::borrowed(text.as_bytes())
    }
}

impl<'a> From<&'a Vec<u8>> for ByteView<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::borrowed(bytes)
    }
}

impl From<Bytes> for ByteView<'static> {
    fn from(bytes: Bytes) -> Self {
        Self {
            repr: Repr::Shared(bytes),
        }
    }
}

impl From<Vec<u8>> for ByteView<'static> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for ByteView<'static> {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl<'a> From<Cow<'a, [u8]>> for ByteView<'a> {
    fn from(bytes: Cow<'a, [u8]>) -> Self {
        match bytes {
            Cow::Borrowed(bytes) => Self::borrowed(bytes),
            Cow::Owned(bytes) => ByteView::from(Bytes::from(bytes)),
        }
    }
}

impl fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView(b\"{}\")", self.as_bytes().escape_ascii())
    }
}

impl PartialEq for ByteView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteView<'_> {}

impl PartialEq<[u8]> for ByteView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for ByteView<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for ByteView<'_> {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.as_bytes() == other.as_slice()
    }
}

impl PartialOrd for ByteView<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteView<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for ByteView<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}
