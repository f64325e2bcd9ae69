//! Digest client.
//!
//! This binary sends one request to a running digest server.

use bytes::BytesMut;
use clap::Parser;
use std::time::Instant;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use digest_cache::cli::{Cli, ClientCommand};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let addr = format!("{}:{}", args.host, args.port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to server at {}: {}", addr, e);
            eprintln!("Make sure the server is running with: cargo run --bin server");
            std::process::exit(1);
        }
    };

    match args.command {
        ClientCommand::Get { text, delay } => {
            // Send: get <text> <delay>
            let request = format!("get {} {}\n", text, delay);
            let start = Instant::now();
            stream.write_all(request.as_bytes()).await?;

            // The server closes the connection after answering.
            let mut buf = BytesMut::with_capacity(64);
            while stream.read_buf(&mut buf).await? > 0 {}

            match std::str::from_utf8(&buf) {
                Ok("") => {
                    eprintln!("The server closed the connection without a response");
                    std::process::exit(1);
                }
                Ok(digest) => {
                    println!("{}", digest);
                    eprintln!("({} ms)", start.elapsed().as_millis());
                }
                Err(e) => {
                    eprintln!("Failed to parse response: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
