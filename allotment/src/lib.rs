//! Allotment.

#[cfg(feature = "config")]
#[doc(inline)]
pub use allotment_config as config;
#[cfg(feature = "config")]
#[doc(inline)]
pub use allotment_config::Config;
#[cfg(feature = "engine")]
#[doc(inline)]
pub use allotment_engine as engine;
#[cfg(feature = "engine")]
#[doc(inline)]
pub use allotment_engine::DirectiveSet;
#[cfg(feature = "engine")]
#[doc(inline)]
pub use allotment_engine::DirectiveSpec;
