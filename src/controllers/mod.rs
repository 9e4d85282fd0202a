// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 站点自带的控制器

pub mod inquiry;

use std::sync::Arc;

use crate::controller::ControllerRegistry;

pub use inquiry::InquiryController;

/// 注册所有内置控制器
pub fn registry() -> ControllerRegistry {
    ControllerRegistry::new().register(Arc::new(InquiryController))
}
