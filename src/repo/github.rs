//! GitHub REST backend for the repo client.
//!
//! Speaks the `api.github.com` contents/tags/commits/zipball endpoints with
//! `Accept: application/vnd.github.v3+json` and an optional
//! `Authorization: token …` header. Any non-2xx response is surfaced
//! verbatim as a network error. Downloads stream the zipball body through a
//! tee that counts bytes for the progress callback.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{CancelToken, RepoClient};

const API_BASE: &str = "https://api.github.com";
const CHUNK: usize = 64 * 1024;

pub struct GithubClient {
    owner: String,
    repo: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl GithubClient {
    pub fn new(owner: &str, repo: &str, token: Option<String>) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
            agent: build_agent(),
        }
    }

    fn api(&self, path: &str) -> Result<String> {
        let raw = format!("{}/repos/{}/{}{}", API_BASE, self.owner, self.repo, path);
        let parsed = url::Url::parse(&raw).map_err(|err| Error::Resolve {
            message: format!("invalid api url {}: {}", raw, err),
        })?;
        Ok(parsed.to_string())
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github.v3+json")
            .set("User-Agent", "yao-workshop");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("token {}", token));
        }
        match request.call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(Error::Network {
                    url: url.to_string(),
                    message: format!("{} {}", code, body.trim()),
                })
            }
            Err(err) => Err(Error::Network {
                url: url.to_string(),
                message: err.to_string(),
            }),
        }
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.get(url)?;
        serde_json::from_reader(response.into_reader()).map_err(|err| Error::Network {
            url: url.to_string(),
            message: format!("invalid response body: {}", err),
        })
    }
}

impl RepoClient for GithubClient {
    fn content(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.api(&format!("/contents/{}", path.trim_start_matches('/')))?;
        let body = self.get_json(&url)?;
        let object = match body {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err(Error::Resolve {
                    message: format!("{} is a directory, not a file", path),
                })
            }
            _ => {
                return Err(Error::Network {
                    url,
                    message: "unexpected contents response".to_string(),
                })
            }
        };
        let encoded = object
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Network {
                url: url.clone(),
                message: "contents response missing content field".to_string(),
            })?;
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64.decode(compact).map_err(|err| Error::Network {
            url,
            message: format!("invalid base64 content: {}", err),
        })
    }

    fn dir(&self, path: &str) -> Result<Vec<String>> {
        let url = self.api(&format!("/contents/{}", path.trim_start_matches('/')))?;
        let body = self.get_json(&url)?;
        let items = match body {
            Value::Array(items) => items,
            _ => {
                return Err(Error::Resolve {
                    message: format!("{} is a file, not a directory", path),
                })
            }
        };
        Ok(items
            .iter()
            .filter_map(|item| item.get("path").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn tags(&self, page: usize, per_page: usize) -> Result<Vec<String>> {
        let url = self.api(&format!("/tags?per_page={}&page={}", per_page, page))?;
        let body = self.get_json(&url)?;
        collect_field(&body, "name", &url)
    }

    fn commits(&self, page: usize, per_page: usize) -> Result<Vec<String>> {
        let url = self.api(&format!("/commits?per_page={}&page={}", per_page, page))?;
        let body = self.get_json(&url)?;
        let shas = collect_field(&body, "sha", &url)?;
        Ok(shas
            .into_iter()
            .map(|sha| sha.chars().take(12).collect())
            .collect())
    }

    fn latest(&self) -> Result<String> {
        let tags = self.tags(1, 1)?;
        if let Some(tag) = tags.into_iter().next() {
            return Ok(tag);
        }
        let commits = self.commits(1, 1)?;
        commits.into_iter().next().ok_or_else(|| Error::Resolve {
            message: format!("{}/{} has no tags or commits", self.owner, self.repo),
        })
    }

    fn download(
        &self,
        rel: &str,
        cancel: Option<&CancelToken>,
        progress: &mut dyn FnMut(u64),
    ) -> Result<PathBuf> {
        let url = self.api(&format!("/zipball/{}", rel))?;
        log::debug!("downloading {}", url);
        let response = self.get(&url)?;
        let mut reader = response.into_reader();

        let tmp = tempfile::Builder::new()
            .prefix("yao-workshop-")
            .suffix(".zip")
            .tempfile()?;
        let (mut file, path) = tmp.keep().map_err(|err| Error::Io(err.error))?;

        let mut total: u64 = 0;
        let mut buf = [0u8; CHUNK];
        loop {
            if cancel.map(CancelToken::is_cancelled).unwrap_or(false) {
                return Err(Error::Network {
                    url,
                    message: "download cancelled".to_string(),
                });
            }
            let n = reader.read(&mut buf).map_err(|err| Error::Network {
                url: url.clone(),
                message: err.to_string(),
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            total += n as u64;
            progress(total);
        }
        log::debug!("downloaded {} bytes to {}", total, path.display());
        Ok(path)
    }
}

fn collect_field(body: &Value, field: &str, url: &str) -> Result<Vec<String>> {
    let items = body.as_array().ok_or_else(|| Error::Network {
        url: url.to_string(),
        message: format!("expected an array of {} entries", field),
    })?;
    Ok(items
        .iter()
        .filter_map(|item| item.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn build_agent() -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new().resolver(SystemResolver);
    if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
        if !proxy.is_empty() {
            if let Ok(proxy) = ureq::Proxy::new(&proxy) {
                builder = builder.proxy(proxy);
            }
        }
    }
    builder.build()
}

/// System DNS with an IPv4 preference: restricted resolvers often return
/// AAAA records for hosts that are unreachable over v6, so IPv6 addresses
/// are filtered out unless `YAO_ENABLE_IPV6` is set.
struct SystemResolver;

impl ureq::Resolver for SystemResolver {
    fn resolve(&self, netloc: &str) -> std::io::Result<Vec<SocketAddr>> {
        use std::net::ToSocketAddrs;
        let addrs: Vec<SocketAddr> = netloc.to_socket_addrs()?.collect();
        if ipv6_enabled() {
            return Ok(addrs);
        }
        let v4: Vec<SocketAddr> = addrs.iter().copied().filter(SocketAddr::is_ipv4).collect();
        if v4.is_empty() {
            Ok(addrs)
        } else {
            Ok(v4)
        }
    }
}

fn ipv6_enabled() -> bool {
    std::env::var("YAO_ENABLE_IPV6")
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v == "1" || v == "true" || v == "on"
        })
        .unwrap_or(false)
}
