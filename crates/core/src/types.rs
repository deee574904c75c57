/// Content-derived identifier of a dataset entity.
///
/// Always 32 lowercase hex characters, or the empty string meaning "no link".
pub type Token = String;

/// Capture timestamp in microseconds.
pub type Timestamp = i64;

/// Translation vector `[x, y, z]` in metres.
pub type Vec3 = [f64; 3];

/// Rotation quaternion `[w, x, y, z]`.
pub type Quat = [f64; 4];
