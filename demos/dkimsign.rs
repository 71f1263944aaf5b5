use dkimsign::{message, Message, SigningConfig, SigningKey};
use std::{env, process};
use tokio::{
    fs,
    io::{self, AsyncReadExt, AsyncWriteExt},
};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut args = env::args();

    let (key_file, domain, selector) = match (
        args.next().as_deref(),
        args.next(),
        args.next(),
        args.next(),
        args.next(),
    ) {
        (_, Some(key_file), Some(domain), Some(selector), None) => (key_file, domain, selector),
        (program, ..) => {
            eprintln!("usage: {} <key_file> <domain> <selector>", program.unwrap_or("dkimsign"));
            process::exit(1);
        }
    };

    let key_file = fs::read_to_string(key_file).await.unwrap();
    let signing_key = SigningKey::from_pem(&key_file).unwrap();

    let config = SigningConfig::new(&domain, &selector, signing_key).unwrap();

    let mut msg = vec![];
    let n = io::stdin().read_to_end(&mut msg).await.unwrap();
    assert!(n > 0, "empty message on stdin");

    let message = Message::parse(&msg).unwrap();

    match message::serialize(&message, Some(&config)) {
        Ok(signed) => {
            let mut stdout = io::stdout();
            stdout.write_all(&signed).await.unwrap();
            stdout.flush().await.unwrap();
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            process::exit(1);
        }
    }
}
