//! jtcodec CLI
//! Usage:
//!   jtcodec packet <file> [--offset N] [--v2] [--big-endian] [--predictor P] [--unsigned]
//!   jtcodec normal [--bits B] <sextant> <octant> <theta> <psi>

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use jtcodec::{
    ByteOrder, DecodeConfig, DeeringNormalCodec, PacketReader, PacketVersion, PredictorType,
};

#[derive(Parser)]
#[command(name = "jtcodec", about = "Decode JT Int32 packets and Deering normals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one Int32 packet and print its values, one per line
    Packet {
        /// File holding the packet
        file: PathBuf,
        /// Byte offset of the packet within the file
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
        /// Packet layout of files with major version 9 and later
        #[arg(long)]
        v2: bool,
        /// Scalars are big-endian
        #[arg(long)]
        big_endian: bool,
        /// Residual predictor to undo (lag1, stride2, xor1, null, ...)
        #[arg(short, long, default_value = "null")]
        predictor: PredictorType,
        /// Print values as unsigned
        #[arg(short, long)]
        unsigned: bool,
    },
    /// Reconstruct a unit normal from Deering codes
    Normal {
        /// Angle resolution in bits
        #[arg(short, long, default_value_t = 8)]
        bits: u32,
        sextant: u32,
        octant: u32,
        theta: u32,
        psi: u32,
    },
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Packet { file, offset, v2, big_endian, predictor, unsigned } => {
            let data = fs::read(&file).unwrap_or_else(|e| fail(format!("reading {}: {}", file.display(), e)));
            let packet = data.get(offset..).unwrap_or_else(|| {
                fail(format!("offset {} beyond {} bytes", offset, data.len()))
            });

            let config = DecodeConfig::default()
                .with_packet_version(if v2 { PacketVersion::V2 } else { PacketVersion::V1 })
                .with_byte_order(if big_endian { ByteOrder::BigEndian } else { ByteOrder::LittleEndian });
            let mut reader = PacketReader::new(packet, config);

            if unsigned {
                let values = reader.read_vec_u32(predictor).unwrap_or_else(|e| fail(e));
                values.iter().for_each(|v| println!("{}", v));
            } else {
                let values = reader.read_vec_i32(predictor).unwrap_or_else(|e| fail(e));
                values.iter().for_each(|v| println!("{}", v));
            }
            eprintln!("  {} bytes consumed", reader.position());
        }
        Commands::Normal { bits, sextant, octant, theta, psi } => {
            let normal = DeeringNormalCodec::new(bits)
                .and_then(|codec| codec.convert_code_to_vec(sextant, octant, theta, psi))
                .unwrap_or_else(|e| fail(e));
            println!("{:.9} {:.9} {:.9}", normal.x, normal.y, normal.z);
        }
    }
}
