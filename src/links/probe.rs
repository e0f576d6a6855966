use async_trait::async_trait;
use log::debug;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use std::error::Error as StdError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

use crate::utils::ip::is_private_or_local;

const MAX_REDIRECTS: usize = 5;

/// Decides whether a destination is live enough to be tracked.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Fetches the URL and requires a plain 200 answer. Only public addresses
/// are ever contacted, including across redirects.
pub struct HttpLinkProbe {
    client: reqwest::Client,
}

impl HttpLinkProbe {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .dns_resolver(Arc::new(PublicOnlyResolver))
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if is_public_target(attempt.url()) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) if is_public_target(&parsed) => {}
            _ => {
                debug!("Not probing non-public destination {}", url);
                return false;
            }
        }
        match self.client.get(url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Literal addresses skip DNS, so they are checked here. Names are left to
/// [`PublicOnlyResolver`].
fn is_public_target(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => !is_private_or_local(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => !is_private_or_local(&IpAddr::V6(ip)),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.');
            !(name.eq_ignore_ascii_case("localhost") || name.ends_with(".localhost"))
        }
        None => false,
    }
}

/// Resolves through the system resolver and drops every non-public address.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(lookup_public(name.as_str().to_string()))
    }
}

async fn lookup_public(host: String) -> Result<Addrs, Box<dyn StdError + Send + Sync>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| !is_private_or_local(&addr.ip()))
        .collect();
    if addrs.is_empty() {
        return Err(format!("{} has no public address", host).into());
    }
    let addrs: Addrs = Box::new(addrs.into_iter());
    Ok(addrs)
}

/// Skips the network check entirely.
pub struct AcceptAllProbe;

#[async_trait]
impl LinkProbe for AcceptAllProbe {
    async fn is_reachable(&self, _url: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, HttpServer, web};

    #[test]
    fn literal_internal_hosts_are_not_public() {
        let public = |url: &str| is_public_target(&Url::parse(url).unwrap());
        assert!(!public("http://127.0.0.1:27017/"));
        assert!(!public("http://169.254.169.254/latest/meta-data/"));
        assert!(!public("http://[::1]/"));
        assert!(!public("http://[::ffff:10.0.0.1]/"));
        assert!(!public("http://localhost:8080/"));
        assert!(!public("http://admin.localhost/"));
        assert!(public("https://example.com/"));
        assert!(public("http://8.8.8.8/"));
    }

    #[actix_rt::test]
    async fn internal_servers_are_never_fetched() {
        let server = HttpServer::new(|| {
            App::new().route("/", web::get().to(|| async { HttpResponse::Ok().finish() }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        // Sanity check that the server answers 200 to a plain client
        let direct = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://127.0.0.1:{}/", port))
            .send()
            .await
            .unwrap();
        assert_eq!(direct.status(), reqwest::StatusCode::OK);

        let probe = HttpLinkProbe::new(Duration::from_secs(2)).unwrap();
        assert!(!probe.is_reachable(&format!("http://127.0.0.1:{}/", port)).await);
        assert!(!probe.is_reachable(&format!("http://localhost:{}/", port)).await);
        assert!(!probe.is_reachable("http://169.254.169.254/").await);

        handle.stop(false).await;
    }

    #[tokio::test]
    async fn names_resolving_only_to_loopback_are_refused() {
        assert!(lookup_public("localhost".to_string()).await.is_err());
    }
}
