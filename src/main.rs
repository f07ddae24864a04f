use anyhow::Result;
use clap::Parser;
mod auth;
mod salt;
use pgps2k::{HashAlgorithm, S2kMode, decode_count, derive_key};
use zeroize::Zeroizing;

#[derive(Debug, Parser)]
#[command(name = "pgps2k")]
#[command(
    version,
    about = "Derive symmetric key material from a passphrase with the OpenPGP string-to-key (S2K) algorithm."
)]
struct Cli {
    /// Passphrase for key derivation; falls back to PGPS2K_PASSPHRASE, piped stdin, or a prompt
    #[arg(short, long, alias = "password")]
    passphrase: Option<String>,

    /// Coded iteration count (0-255)
    #[arg(short, long)]
    coded_count: Option<u32>,

    /// 8-byte salt as hex ("0a0b0c0d0e0f1011") or comma-separated integers ("10,11,12,13,14,15,16,17")
    #[arg(short, long)]
    salt: Option<String>,

    /// Desired key length in bytes
    #[arg(short = 'l', long, default_value_t = 16)]
    key_length: usize,

    /// S2K mode: 0=Simple, 1=Salted, 3=Iterated+Salted
    #[arg(short, long, default_value_t = 3)]
    mode: u8,

    /// Hash algorithm (sha1, sha224, sha256, sha384, sha512)
    #[arg(long, env = "PGPS2K_HASH", default_value = "sha1")]
    hash: HashAlgorithm,

    /// Show the full parameter block instead of only the key
    #[arg(short, long)]
    verbose: bool,
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let mode = S2kMode::from_code(args.mode)?;
    let salt = args.salt.as_deref().map(salt::parse_salt).transpose()?;

    // The coded count is range-checked whenever given, even for modes that
    // never consume it.
    let decoded = args.coded_count.map(decode_count).transpose()?;
    let count = if mode == S2kMode::IteratedSalted {
        decoded
    } else {
        None
    };

    let passphrase = match args.passphrase {
        Some(p) => Zeroizing::new(p),
        None => auth::read_passphrase()?,
    };

    let (key, used_salt) = derive_key(
        args.hash,
        &passphrase,
        args.key_length,
        mode,
        salt.as_ref().map(|s| s.as_slice()),
        count,
    )?;
    drop(passphrase);

    if args.verbose {
        println!("Parameters:");
        if let Some(encoded) = args.coded_count {
            println!("  Coded count: {encoded}");
        }
        if let Some(n) = decoded {
            println!("  Actual iteration count: {}", group_thousands(n));
        }
        if !used_salt.is_empty() {
            println!("  Salt (hex): {}", hex::encode(&used_salt));
        }
        println!("  Key length: {} bytes", args.key_length);
        println!("  S2K mode: {mode}");
        println!("  Hash algorithm: {}", args.hash);
        println!();
        println!("Derived key (hex): {}", hex::encode(key.as_slice()));
        println!("Derived key (bytes): {:?}", key.as_slice());
    } else {
        println!("{}", hex::encode(key.as_slice()));
    }

    Ok(())
}
