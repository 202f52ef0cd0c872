//! RTMP handshake: a version byte plus 1536-byte blocks each way, with the
//! HMAC-SHA256 digest variant tried first and a fallback to the plain
//! random-echo exchange when the peer's block carries no digest.

mod digest;

pub use digest::*;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::utils::{current_timestamp, generate_random_bytes};
use crate::{Error, Result};

pub const RTMP_VERSION: u8 = 3;
pub const HANDSHAKE_BLOCK_SIZE: usize = 1536;

/// Client version bytes advertised in C1
const CLIENT_VERSION: [u8; 4] = [0x09, 0x00, 0x7C, 0x02];
/// Server version bytes advertised in S1
const SERVER_VERSION: [u8; 4] = [0x0D, 0x0E, 0x0A, 0x0D];

/// Run the server side: read C0+C1, answer S0+S1+S2, read C2
pub async fn handshake_server<R, W>(rd: &mut R, wr: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut c0 = [0u8; 1];
    rd.read_exact(&mut c0).await?;
    if c0[0] != RTMP_VERSION {
        return Err(Error::handshake(format!(
            "VersionInvalid({})",
            c0[0]
        )));
    }

    let mut c1 = vec![0u8; HANDSHAKE_BLOCK_SIZE];
    rd.read_exact(&mut c1).await?;

    let client_time = [c1[0], c1[1], c1[2], c1[3]];

    let mut s0s1s2 = vec![0u8; 1 + HANDSHAKE_BLOCK_SIZE * 2];
    s0s1s2[0] = RTMP_VERSION;

    match parse_challenge(&c1, client_partial_key(), &SERVER_FULL_KEY) {
        Some(response_key) => {
            debug!("digest handshake accepted");
            {
                let s1 = &mut s0s1s2[1..1 + HANDSHAKE_BLOCK_SIZE];
                s1.copy_from_slice(&generate_random_bytes(HANDSHAKE_BLOCK_SIZE));
                s1[0..4].copy_from_slice(&client_time);
                s1[4..8].copy_from_slice(&SERVER_VERSION);
                create_challenge(s1, server_partial_key());
            }
            let s2 = &mut s0s1s2[1 + HANDSHAKE_BLOCK_SIZE..];
            s2.copy_from_slice(&generate_random_bytes(HANDSHAKE_BLOCK_SIZE));
            create_response(s2, &response_key);
        }
        None => {
            debug!("no digest in C1, falling back to simple handshake");
            let s1 = generate_random_bytes(HANDSHAKE_BLOCK_SIZE);
            s0s1s2[1..1 + HANDSHAKE_BLOCK_SIZE].copy_from_slice(&s1);
            s0s1s2[1 + HANDSHAKE_BLOCK_SIZE..].copy_from_slice(&c1);
        }
    }

    wr.write_all(&s0s1s2).await?;
    wr.flush().await?;

    let mut c2 = vec![0u8; HANDSHAKE_BLOCK_SIZE];
    rd.read_exact(&mut c2).await?;

    Ok(())
}

/// Run the client side: write C0+C1 with a digest, read S0+S1+S2,
/// answer C2
pub async fn handshake_client<R, W>(rd: &mut R, wr: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_BLOCK_SIZE];
    c0c1[0] = RTMP_VERSION;
    {
        let c1 = &mut c0c1[1..];
        c1.copy_from_slice(&generate_random_bytes(HANDSHAKE_BLOCK_SIZE));
        c1[0..4].copy_from_slice(&current_timestamp().to_be_bytes());
        c1[4..8].copy_from_slice(&CLIENT_VERSION);
        create_challenge(c1, client_partial_key());
    }
    wr.write_all(&c0c1).await?;
    wr.flush().await?;

    let mut s0s1s2 = vec![0u8; 1 + HANDSHAKE_BLOCK_SIZE * 2];
    rd.read_exact(&mut s0s1s2).await?;
    if s0s1s2[0] != RTMP_VERSION {
        return Err(Error::handshake(format!(
            "VersionInvalid({})",
            s0s1s2[0]
        )));
    }

    let s1 = &s0s1s2[1..1 + HANDSHAKE_BLOCK_SIZE];
    let mut c2 = vec![0u8; HANDSHAKE_BLOCK_SIZE];
    match parse_challenge(s1, server_partial_key(), &CLIENT_FULL_KEY) {
        Some(response_key) => {
            c2.copy_from_slice(&generate_random_bytes(HANDSHAKE_BLOCK_SIZE));
            create_response(&mut c2, &response_key);
        }
        None => {
            // simple mode: echo S1
            c2.copy_from_slice(s1);
        }
    }
    wr.write_all(&c2).await?;
    wr.flush().await?;

    Ok(())
}
