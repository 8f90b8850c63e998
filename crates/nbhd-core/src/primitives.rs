//! # Primitives
//!
//! Fixed constants for record identity, schema inference, and storage.
//!
//! These values are part of the interoperability contract with other
//! AT-Protocol speaking peers and are compiled in; nothing here is
//! configurable at runtime.

// =============================================================================
// CONTENT IDENTIFIERS
// =============================================================================

/// Tag prepended to every CID.
///
/// `baf` marks CIDv1, `y` the lowercase base-32 multibase.
pub const CID_PREFIX: &str = "bafy";

/// Minimum plausible CID length: prefix + 52 base-32 chars of a SHA-256 digest.
pub const MIN_CID_LENGTH: usize = 56;

/// Anything longer than this is treated as malformed.
pub const MAX_CID_LENGTH: usize = 200;

/// Maximum nesting depth accepted by the canonical encoder.
///
/// Deeper values are rejected instead of risking unbounded recursion.
pub const MAX_ENCODING_DEPTH: usize = 128;

// =============================================================================
// TIMESTAMP IDENTIFIERS
// =============================================================================

/// Length of a rendered TID (8 bytes in unpadded base-32).
pub const TID_LENGTH: usize = 13;

/// Number of random low bits in a TID.
pub const TID_RANDOM_BITS: u32 = 10;

/// Mask selecting the random component of a packed TID.
pub const TID_RANDOM_MASK: u64 = (1 << TID_RANDOM_BITS) - 1;

/// Mask applied to the microsecond timestamp before packing (54 bits).
pub const TID_TIMESTAMP_MASK: u64 = (1 << (64 - TID_RANDOM_BITS)) - 1;

/// Padding re-appended before decoding a 13-character TID.
pub const TID_PADDING: &str = "===";

/// Maximum number of fresh rkeys drawn when a generated key collides in the store.
pub const MAX_RKEY_ATTEMPTS: usize = 8;

// =============================================================================
// SCHEMA INFERENCE
// =============================================================================

/// Fields whose name starts with this prefix are internal and never inferred.
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// A field is required when `present * REQUIRED_DENOMINATOR > total * REQUIRED_NUMERATOR`.
///
/// Together these express "strictly more than 80%" in integer arithmetic.
pub const REQUIRED_NUMERATOR: usize = 4;

/// See [`REQUIRED_NUMERATOR`].
pub const REQUIRED_DENOMINATOR: usize = 5;

// =============================================================================
// RECORD COLLECTIONS
// =============================================================================

/// Collection for full blog posts.
pub const BLOG_POST_COLLECTION: &str = "app.nbhd.blog.post";

/// Collection for BlueSky feed posts.
pub const FEED_POST_COLLECTION: &str = "app.bsky.feed.post";

/// Facet feature type for links inside feed post text.
pub const LINK_FACET_TYPE: &str = "app.bsky.richtext.facet#link";

/// Hard limit on feed post text, in characters.
pub const MAX_FEED_POST_CHARS: usize = 300;

/// Excerpt length used when a post has no usable first paragraph.
pub const FALLBACK_EXCERPT_CHARS: usize = 150;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Magic bytes for the nbhd snapshot file header.
pub const MAGIC_BYTES: &[u8; 4] = b"NBHD";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum length of an owner identifier (DID).
pub const MAX_OWNER_LENGTH: usize = 2048;

/// Maximum length of a collection NSID.
pub const MAX_COLLECTION_LENGTH: usize = 317;

/// Maximum number of markdown files scanned in a single template.
pub const MAX_TEMPLATE_FILES: usize = 10_000;
