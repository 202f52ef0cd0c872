use url::Url;

use crate::{Error, Result};

/// Split the request path into `(app, stream key)`. The first two path
/// segments form the app when the path is deep; the stream key keeps any
/// query string, since stream keys carry auth tokens there.
pub fn split_path(u: &Url) -> (String, String) {
    let mut request = u.path().to_string();
    if let Some(q) = u.query() {
        request.push('?');
        request.push_str(q);
    }

    let segs: Vec<&str> = request.split('/').collect();
    match segs.len() {
        0 | 1 => (String::new(), String::new()),
        2 => (segs[1].to_string(), String::new()),
        3 => (segs[1].to_string(), segs[2].to_string()),
        _ => (segs[1..3].join("/"), segs[3..].join("/")),
    }
}

/// Default RTMP ports by scheme
pub fn default_port(scheme: &str) -> u16 {
    match scheme {
        "rtmps" => 443,
        _ => 1935,
    }
}

/// `host:port` for dialing, filling in the scheme's default port
pub fn host_with_port(u: &Url) -> Result<String> {
    let host = u
        .host_str()
        .ok_or_else(|| Error::command("URL has no host"))?;
    let port = u.port().unwrap_or_else(|| default_port(u.scheme()));
    Ok(format!("{}:{}", host, port))
}

/// Reconstruct the tcUrl: `scheme://host[:port]/app`, query dropped
pub fn tc_url(u: &Url) -> String {
    let (app, _) = split_path(u);
    let host = u.host_str().unwrap_or_default();
    match u.port() {
        Some(p) => format!("{}://{}:{}/{}", u.scheme(), host, p, app),
        None => format!("{}://{}/{}", u.scheme(), host, app),
    }
}

/// Assemble the full stream URL from the connect-time tcUrl and the
/// app/key the publish or play command supplied
pub fn create_url(tcurl: &str, app: &str, key: &str) -> Result<Url> {
    let tu = Url::parse(tcurl).map_err(|e| Error::command(format!("bad tcUrl: {}", e)))?;
    let host = tu
        .host_str()
        .ok_or_else(|| Error::command("tcUrl has no host"))?;
    if tu.scheme().is_empty() {
        return Err(Error::command("tcUrl has no scheme"));
    }

    let authority = match tu.port() {
        Some(p) => format!("{}:{}", host, p),
        None => host.to_string(),
    };
    let raw = format!("{}://{}/{}/{}", tu.scheme(), authority, app, key);
    Url::parse(&raw).map_err(|e| Error::command(format!("bad stream URL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_app_and_key() {
        let u = Url::parse("rtmp://host/live/room1").unwrap();
        assert_eq!(split_path(&u), ("live".to_string(), "room1".to_string()));
    }

    #[test]
    fn test_split_app_only() {
        let u = Url::parse("rtmp://host/live").unwrap();
        assert_eq!(split_path(&u), ("live".to_string(), String::new()));
    }

    #[test]
    fn test_split_deep_path() {
        let u = Url::parse("rtmp://host/a/b/c/d").unwrap();
        assert_eq!(split_path(&u), ("a/b".to_string(), "c/d".to_string()));
    }

    #[test]
    fn test_split_keeps_query_in_key() {
        let u = Url::parse("rtmp://host/live/room1?token=abc").unwrap();
        assert_eq!(
            split_path(&u),
            ("live".to_string(), "room1?token=abc".to_string())
        );
    }

    #[test]
    fn test_default_ports() {
        let u = Url::parse("rtmp://host/live").unwrap();
        assert_eq!(host_with_port(&u).unwrap(), "host:1935");

        let u = Url::parse("rtmps://host/live").unwrap();
        assert_eq!(host_with_port(&u).unwrap(), "host:443");

        let u = Url::parse("rtmp://host:1936/live").unwrap();
        assert_eq!(host_with_port(&u).unwrap(), "host:1936");
    }

    #[test]
    fn test_tc_url() {
        let u = Url::parse("rtmp://host/live/room1?t=1").unwrap();
        assert_eq!(tc_url(&u), "rtmp://host/live");

        let u = Url::parse("rtmp://host:1936/live/room1").unwrap();
        assert_eq!(tc_url(&u), "rtmp://host:1936/live");
    }

    #[test]
    fn test_create_url() {
        let u = create_url("rtmp://host/live", "live", "room1").unwrap();
        assert_eq!(u.as_str(), "rtmp://host/live/room1");
        assert_eq!(u.path(), "/live/room1");

        assert!(create_url("not a url", "live", "x").is_err());
    }
}
