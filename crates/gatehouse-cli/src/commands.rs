//! Command parsing for the terminal front end.
//!
//! Parses operator input lines into structured [`Command`] values.

/// Parsed command from operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start hosting on an address.
    Host {
        /// Listen address.
        addr: String,
    },

    /// Join a host with credentials.
    Join {
        /// Host address to dial.
        addr: String,
        /// Account name.
        username: String,
        /// Password.
        password: String,
    },

    /// Toggle registration requests from unknown users.
    Register {
        /// New value of the flag.
        enabled: bool,
    },

    /// Approve the pending registration request.
    Allow,

    /// Deny the pending registration request.
    Deny,

    /// Trust the dialed host's key and continue authenticating.
    Trust,

    /// Abort the dialed connection without authenticating.
    Abort,

    /// List registered users.
    Users,

    /// Quit the application.
    Quit,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse an operator input line into a command.
///
/// All commands start with `/`.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "host" => match parts.get(1) {
            Some(addr) => Command::Host { addr: (*addr).to_string() },
            None => Command::InvalidArgs {
                command: "host".into(),
                error: "Usage: /host <addr>".into(),
            },
        },

        "join" => match (parts.get(1), parts.get(2), parts.get(3)) {
            (Some(addr), Some(username), Some(password)) => Command::Join {
                addr: (*addr).to_string(),
                username: (*username).to_string(),
                password: (*password).to_string(),
            },
            _ => Command::InvalidArgs {
                command: "join".into(),
                error: "Usage: /join <addr> <username> <password>".into(),
            },
        },

        "register" => match parts.get(1) {
            Some(&"on") => Command::Register { enabled: true },
            Some(&"off") => Command::Register { enabled: false },
            _ => Command::InvalidArgs {
                command: "register".into(),
                error: "Usage: /register on|off".into(),
            },
        },

        "allow" => Command::Allow,

        "deny" => Command::Deny,

        "trust" => Command::Trust,

        "abort" => Command::Abort,

        "users" => Command::Users,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
