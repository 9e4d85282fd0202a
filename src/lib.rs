// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod asset_cache;
pub mod command;
pub mod config;
pub mod controller;
pub mod controllers;
pub mod dispatcher;
pub mod exception;
pub mod logging;
pub mod mail;
pub mod page_cache;
pub mod param;
pub mod redirect;
pub mod request;
pub mod response;
pub mod router;
pub mod scheduler;
pub mod util;
pub mod view;

pub use config::{Config, ConfigStore};
pub use controller::{Controller, ControllerContext, ControllerRegistry};
pub use dispatcher::Dispatcher;
pub use exception::Exception;
pub use page_cache::{CacheEntry, PageCache};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use redirect::RedirectMap;
pub use request::Request;
pub use response::Response;
pub use router::{DispatchFailure, Resolution, Route, Router};
pub use util::HtmlBuilder;
pub use view::{PageContext, Render, TemplateRenderer};
