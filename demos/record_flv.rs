// Record an RTMP stream (or a single inbound publisher with the `@`
// prefix) into a local FLV file
//
// Usage:
//   cargo run --example record_flv <rtmp://host/app/key> <output.flv>
//   cargo run --example record_flv @rtmp://0.0.0.0/live/demo <output.flv>

use log::{error, info};
use rtmpcast::{open_read, open_write};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (input, output) = match (args.next(), args.next()) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            eprintln!("usage: record_flv <rtmp-url | @rtmp-url> <output.flv>");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&input, &output).await {
        error!("recording failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(input: &str, output: &str) -> rtmpcast::Result<()> {
    let mut src = open_read(input).await?;
    let mut dst = open_write(output).await?;

    let mut packets = 0u64;
    loop {
        match src.read_packet().await {
            Ok(pkt) => {
                dst.write_packet(pkt).await?;
                packets += 1;
            }
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e),
        }
    }
    dst.flush().await?;

    info!("recorded {} packets into {}", packets, output);
    Ok(())
}
