// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求调度
//!
//! 每个请求依次经过：
//! 1. 公共目录静态文件（仅 GET/HEAD）。
//! 2. 永久重定向表，命中即返回 301。
//! 3. 整页缓存（开启缓存且请求不是带请求体的 POST 时），命中即返回缓存内容。
//! 4. 路由解析：页面模板优先，其次是控制器。页面渲染成功后写入缓存。
//! 5. 都不匹配时渲染 404 页面，不写入缓存。
//!
//! 任何一步产生响应后，后续步骤都不会执行。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use log::{debug, error, info, warn};

use crate::{
    asset_cache::AssetCache,
    config::Config,
    controller::{finish_html, render_status_page, ControllerContext, ControllerRegistry},
    controllers,
    exception::Exception,
    mail::MailQueue,
    page_cache::PageCache,
    param::*,
    redirect::RedirectMap,
    request::Request,
    response::Response,
    router::{Resolution, Route, Router},
    view::{PageContext, Render, TemplateRenderer},
};

pub struct Dispatcher {
    config: Config,
    redirects: RedirectMap,
    page_cache: PageCache,
    router: Router,
    controllers: ControllerRegistry,
    renderer: Box<dyn Render>,
    mail_queue: MailQueue,
    assets: Mutex<AssetCache>,
}

impl Dispatcher {
    /// 按配置加载重定向表、模板渲染器和内置控制器。
    pub fn new(config: Config) -> Result<Self, Exception> {
        let redirects = RedirectMap::from_toml(config.redirects_file())?;
        let renderer = TemplateRenderer::new(config.pages_dir(), &config);
        Ok(Self::with_parts(
            config,
            redirects,
            Box::new(renderer),
            controllers::registry(),
        ))
    }

    pub fn with_parts(
        config: Config,
        redirects: RedirectMap,
        renderer: Box<dyn Render>,
        controllers: ControllerRegistry,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.asset_capacity()).unwrap_or(NonZeroUsize::MIN);
        Self {
            redirects,
            page_cache: PageCache::new(config.cache_dir()),
            router: Router::new(config.pages_dir(), config.template_extension()),
            controllers,
            renderer,
            mail_queue: MailQueue::new(config.mail_queue_dir()),
            assets: Mutex::new(AssetCache::new(config.public_dir(), capacity)),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn page_cache(&self) -> &PageCache {
        &self.page_cache
    }

    pub fn mail_queue(&self) -> &MailQueue {
        &self.mail_queue
    }

    /// 解析原始请求并处理。请求无法解析时返回对应的错误页。
    pub fn handle_bytes(&self, buffer: &[u8], id: u128) -> Response {
        match Request::try_from(buffer, id) {
            Ok(request) => self.handle(&request, id),
            Err(e) => {
                warn!("[ID{}]请求解析失败：{}", id, e);
                Response::from_status_code(e.status_code()).set_date().to_owned()
            }
        }
    }

    /// 处理一个已解析的请求，返回可直接写回客户端的响应。
    pub fn handle(&self, request: &Request, id: u128) -> Response {
        let mut response = match request.method() {
            HttpRequestMethod::Options => {
                debug!("[ID{}]请求方法为OPTIONS", id);
                Response::options()
            }
            HttpRequestMethod::Get | HttpRequestMethod::Head => match self.serve_asset(request, id) {
                Some(response) => response,
                None => self.dispatch(request, id),
            },
            HttpRequestMethod::Post => self.dispatch(request, id),
        };
        response.negotiate(request, id).set_date();
        response
    }

    fn serve_asset(&self, request: &Request, id: u128) -> Option<Response> {
        let mut assets = match self.assets.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("[ID{}]缓存锁被污染，恢复并继续", id);
                poisoned.into_inner()
            }
        };
        let path = assets.locate(request.path_only())?;
        match assets.fetch(&path) {
            Ok(asset) => {
                debug!("[ID{}]静态文件：{}", id, path.display());
                Some(Response::asset(asset.body, asset.mime))
            }
            Err(e) => {
                error!("[ID{}]无法读取静态文件{}：{}", id, path.display(), e);
                None
            }
        }
    }

    /// 前端控制器流水线：重定向、缓存、页面、控制器、404。
    pub fn dispatch(&self, request: &Request, id: u128) -> Response {
        let url = request.route_url();

        if let Some(target) = self.redirects.resolve(&url) {
            info!("[ID{}]永久重定向：{} -> {}", id, url, target);
            return Response::redirect(301, &target);
        }

        let cache_key = match self.config.cache_enabled() && !request.has_post_body() {
            true => Some(PageCache::key_for(
                &request.full_url(),
                self.config.cache_key(),
                self.config.minify(),
            )),
            false => None,
        };
        if let Some(key) = &cache_key {
            match self.page_cache.load(key) {
                Ok(Some(entry)) => {
                    debug!("[ID{}]From Cache :: {}", id, url);
                    return Response::html(entry.status, entry.body);
                }
                Ok(None) => {}
                Err(e) => warn!("[ID{}]读取页面缓存失败：{}", id, e),
            }
        }

        let route = Route::parse(&url);
        match self.router.resolve(&route, &self.controllers) {
            Resolution::StaticPage { template, .. } => {
                let context = PageContext::new(&self.config, request, 200);
                let html = match self.renderer.render(&template, &context) {
                    Ok(html) => finish_html(&self.config, html),
                    Err(e) => {
                        error!("[ID{}]渲染页面{}失败：{}", id, template, e);
                        return self.status_page(request, SERVER_ERROR_PAGE, 500, id);
                    }
                };
                if let Some(key) = &cache_key {
                    if let Err(e) = self.page_cache.store(key, 200, html.as_bytes()) {
                        warn!("[ID{}]写入页面缓存失败：{}", id, e);
                    }
                }
                debug!("[ID{}]From Code :: {}", id, url);
                Response::html(200, html)
            }
            Resolution::Controller { identifier, action } => {
                let Some(controller) = self.controllers.get(&identifier) else {
                    error!("[ID{}]控制器{}不存在", id, identifier);
                    return self.status_page(request, NOT_FOUND_PAGE, 404, id);
                };
                let ctx = ControllerContext {
                    request,
                    config: &self.config,
                    renderer: self.renderer.as_ref(),
                    mail_queue: &self.mail_queue,
                    id,
                };
                debug!("[ID{}]调用{}::{}", id, identifier, action);
                match controller.invoke(&action, &ctx) {
                    Ok(response) => response,
                    Err(e) => {
                        error!("[ID{}]{}::{}执行失败：{}", id, identifier, action, e);
                        ctx.render_server_error()
                    }
                }
            }
            Resolution::NotFound(failure) => {
                error!("[ID{}]{}：{}", id, url, failure);
                self.status_page(request, NOT_FOUND_PAGE, 404, id)
            }
        }
    }

    fn status_page(&self, request: &Request, page: &str, code: u16, id: u128) -> Response {
        render_status_page(self.renderer.as_ref(), &self.config, request, page, code, id)
    }

    /// 清空整页缓存，返回删除的文件数
    pub fn clear_cache(&self) -> Result<usize, Exception> {
        self.page_cache.clear()
    }
}
