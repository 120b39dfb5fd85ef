//! Channel mode string parsing.

/// One letter of a MODE line with the sign in effect and its argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    pub adding: bool,
    pub letter: char,
    pub arg: Option<String>,
}

/// Whether `letter` consumes an argument when applied with sign `adding`.
///
/// Bans and member privileges always take one. Key and limit take one only
/// when being set. Any other letter takes none.
pub fn takes_arg(letter: char, adding: bool) -> bool {
    match letter {
        'b' | 'o' | 'v' | 'h' | 'a' | 'q' => true,
        'k' | 'l' => adding,
        _ => false,
    }
}

/// Parse a channel mode string like `+ov-l` with its arguments.
///
/// Letters are read left to right under a running sign (`+` when the string
/// has no leading sign). Each parameterized letter takes the next unused
/// argument; a missing argument leaves `arg` empty.
pub fn parse_channel_modes(modes: &str, args: &[String]) -> Vec<ModeChange> {
    let mut res = Vec::with_capacity(modes.len());
    let mut args = args.iter();
    let mut adding = true;

    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                let arg = if takes_arg(c, adding) {
                    args.next().cloned()
                } else {
                    None
                };
                res.push(ModeChange {
                    adding,
                    letter: c,
                    arg,
                });
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_arguments_in_order() {
        let changes = parse_channel_modes("+ov", &args(&["alice", "bob"]));
        assert_eq!(
            changes,
            vec![
                ModeChange { adding: true, letter: 'o', arg: Some("alice".into()) },
                ModeChange { adding: true, letter: 'v', arg: Some("bob".into()) },
            ]
        );
    }

    #[test]
    fn test_running_sign() {
        let changes = parse_channel_modes("+m-t+i", &[]);
        let signs: Vec<_> = changes.iter().map(|c| (c.letter, c.adding)).collect();
        assert_eq!(signs, vec![('m', true), ('t', false), ('i', true)]);
    }

    #[test]
    fn test_ban_consumes_argument() {
        let changes = parse_channel_modes("+bo", &args(&["*!*@bad", "alice"]));
        assert_eq!(changes[0].arg.as_deref(), Some("*!*@bad"));
        assert_eq!(changes[1].arg.as_deref(), Some("alice"));
    }

    #[test]
    fn test_limit_argument_only_when_setting() {
        let changes = parse_channel_modes("-l+k", &args(&["secret"]));
        assert_eq!(changes[0].arg, None);
        assert_eq!(changes[1].arg.as_deref(), Some("secret"));
    }

    #[test]
    fn test_key_removal_takes_no_argument() {
        let changes = parse_channel_modes("-k+o", &args(&["alice"]));
        assert_eq!(changes[0].arg, None);
        assert_eq!(changes[1].arg.as_deref(), Some("alice"));
    }

    #[test]
    fn test_unknown_letters_take_no_argument() {
        let changes = parse_channel_modes("+eIv", &args(&["bob"]));
        assert_eq!(changes[0].arg, None);
        assert_eq!(changes[1].arg, None);
        assert_eq!(changes[2].arg.as_deref(), Some("bob"));
    }

    #[test]
    fn test_missing_argument() {
        let changes = parse_channel_modes("+b", &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].arg, None);
    }

    #[test]
    fn test_no_leading_sign_defaults_to_adding() {
        let changes = parse_channel_modes("n", &[]);
        assert!(changes[0].adding);
    }
}
