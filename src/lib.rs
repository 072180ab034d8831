//! A client library for driving a web-rendering engine through its
//! debugging wire protocol: frame codec and handshake (C1/C2), a blocking
//! request/response multiplexer with typed event fan-out (C3), a reconnect
//! and heartbeat supervisor (C4), a typed command surface (C5), and the
//! Page/Context/Browser Root object graph (C6/C7/C8) with an ordered
//! request-interception engine on top (C9).

pub mod browser;
pub mod command;
pub mod config;
pub mod context;
pub mod discovery;
pub mod domains;
pub mod error;
pub mod intercept;
pub mod page;
pub mod process;
pub mod session;
pub mod supervisor;
pub mod ws;

pub use browser::Browser;
pub use command::CommandSurface;
pub use config::{BrowserConfig, BrowserConfigBuilder};
pub use context::Context;
pub use error::{Error, Result};
pub use intercept::{InterceptAction, InterceptedRequest, Interceptor, MockResponse, RuleHandle};
pub use page::Page;
pub use session::{HandlerToken, Session, SessionState};
pub use supervisor::{ReconnectEvent, Supervisor, SupervisorConfig};
