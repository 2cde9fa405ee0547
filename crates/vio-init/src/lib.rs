#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use vio_linalg as linalg;

#[doc(inline)]
pub use vio_pose as pose;

#[doc(inline)]
pub use vio_extrinsic as extrinsic;
