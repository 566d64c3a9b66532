// Remote device capability: the narrow seam to discovery, auth, listing and route I/O.

pub mod mock;
pub mod traits;
