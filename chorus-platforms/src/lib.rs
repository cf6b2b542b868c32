//! Platform sessions: the uniform scraping lifecycle and the closed set of
//! seven platform adapters.
//!
//! Each adapter binds one platform's private web API (raw serde shapes +
//! endpoints, cookie-authenticated through the shared browser session) to the
//! [`session::PlatformAdapter`] contract. The [`session::Session`] lifecycle
//! driver and the [`pacer::Pacer`] request gate are platform-agnostic.

pub mod pacer;
pub mod session;

pub mod bilibili;
pub mod douyin;
pub mod kuaishou;
pub mod tieba;
pub mod weibo;
pub mod xiaohongshu;
pub mod zhihu;

mod html;
mod identity;

pub use pacer::Pacer;
pub use session::{PlatformAdapter, Session, SessionState};
