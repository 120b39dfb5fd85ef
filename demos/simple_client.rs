//! Simple IRC client example
//!
//! Connects to a server, joins a channel, looks a few people up, greets the
//! channel and echoes what it hears for a while before quitting.
//!
//! ```text
//! cargo run --example simple_client -- irc.libera.chat 6697 '#slirc-test'
//! ```

use std::env;
use std::time::Duration;

use anyhow::Context;
use slirc_client::{Client, ClientConfig, Event, EventKind, VerifyMode};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slirc_client=info".into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "irc.libera.chat".to_string());
    let port: u16 = args
        .next()
        .map(|p| p.parse())
        .transpose()
        .context("port must be a number")?
        .unwrap_or(6697);
    let channel = args.next().unwrap_or_else(|| "#slirc-test".to_string());

    let mut config = ClientConfig::new(&host, port, "slirc_example")
        .with_realname("slirc-client example")
        .with_verbose(true);
    if port == 6697 {
        config = config.with_tls(VerifyMode::Full);
    }

    let client = Client::new(config);

    client.on(EventKind::Message, |event| {
        if let Event::Message { source, target, text } = event {
            let from = source.as_ref().and_then(|s| s.nick.as_deref()).unwrap_or("?");
            println!("← [{}] <{}> {}", target, from, text);
        }
    });
    client.on(EventKind::Topic, |event| {
        if let Event::Topic { channel, topic: Some(topic), .. } = event {
            println!("✓ Topic of {}: {}", channel, topic);
        }
    });
    client.on(EventKind::Error, |event| {
        if let Event::Error { numeric, message } = event {
            eprintln!("✗ Server error {:?}: {}", numeric, message);
        }
    });
    client.on(EventKind::Disconnect, |_| println!("Connection closed"));

    client
        .connect(Duration::from_secs(30))
        .with_context(|| format!("connecting to {}:{}", host, port))?;
    println!("✓ Registered as {}", client.nick());

    client
        .join(&channel, None, Duration::from_secs(15))
        .with_context(|| format!("joining {}", channel))?;
    if let Some(joined) = client.channel(&channel) {
        println!("✓ {} has {} users", joined.name, joined.users.len());
    }

    let online = client.ison(&["ChanServ", "NickServ", "nobody_here_42"], Duration::from_secs(10))?;
    println!("✓ Online services: {}", online.join(", "));

    match client.whois("NickServ", Duration::from_secs(10))? {
        Some(info) => println!(
            "✓ NickServ is {}@{}",
            info.user.unwrap_or_default(),
            info.host.unwrap_or_default()
        ),
        None => println!("NickServ is not on this network"),
    }

    client.privmsg(&channel, "Hello from slirc-client!")?;

    std::thread::sleep(Duration::from_secs(30));

    client.quit(Some("Example finished"))?;
    Ok(())
}
