#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod fixture {
    use std::fs;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;

    use meteor_host::HostConfig;
    use tempfile::TempDir;

    /// A document root plus a sibling file that must never be served.
    pub struct DocRoot {
        pub dir: TempDir,
        pub root: PathBuf,
    }

    impl DocRoot {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("host");
            fs::create_dir_all(root.join("covers/nested")).unwrap();
            fs::write(root.join("index.html"), "<h1>meteor</h1>").unwrap();
            fs::write(root.join("app.js"), "console.log(1)").unwrap();
            fs::write(root.join("style.css"), "body{}").unwrap();
            fs::write(root.join("x.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
            fs::write(root.join("x.unknownext"), "??").unwrap();
            fs::write(root.join("my file.html"), "spaced").unwrap();
            fs::write(root.join("covers/a.png"), "a").unwrap();
            fs::write(root.join("covers/b.jpg"), "b").unwrap();
            fs::write(root.join("covers/c.txt"), "c").unwrap();
            fs::write(root.join("covers/nested/d.png"), "d").unwrap();
            fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
            Self { dir, root }
        }

        /// Loopback, ephemeral port, this root.
        pub fn config(&self) -> HostConfig {
            HostConfig::new()
                .with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
                .with_port(0)
                .with_document_root(&self.root)
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Write `req` verbatim and read until the server closes.
    pub fn send_raw(addr: &SocketAddr, req: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        buf
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        String::from_utf8_lossy(&send_raw(addr, req.as_bytes())).to_string()
    }

    pub fn get(addr: &SocketAddr, path: &str) -> String {
        send_request(addr, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
    }

    /// Status, Content-Type and body of a raw response.
    pub fn parse_parts(resp: &str) -> (u16, String, String) {
        let (headers, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut content_type = String::new();
        for line in headers.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line.split_whitespace().nth(1).unwrap_or("0").parse().unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-type") {
                    content_type = val.trim().to_string();
                }
            }
        }
        (status, content_type, body.to_string())
    }

    pub fn header<'a>(resp: &'a str, name: &str) -> Option<&'a str> {
        let (headers, _) = resp.split_once("\r\n\r\n")?;
        headers.lines().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}
