//! Fuzz target for channel MODE parsing and roster application.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::mode::parse_channel_modes;
use slirc_client::Channel;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut parts = input.split(' ');
    let modes = parts.next().unwrap_or_default();
    let args: Vec<String> = parts.map(str::to_owned).collect();

    let changes = parse_channel_modes(modes, &args);
    assert!(changes.iter().filter(|c| c.arg.is_some()).count() <= args.len());

    let mut channel = Channel::new("#fuzz");
    for arg in &args {
        channel.add_user(arg);
    }
    for change in &changes {
        channel.apply_mode(change);
    }
});
