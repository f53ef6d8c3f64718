use std::fmt;

/// The per-packet values the operator can chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Field {
    PacketSize,
    TcpWindowSize,
    TcpFlags,
    TlsVersion,
    TlsLength,
    IpLength,
    IpTtl,
}

impl Field {
    /// Menu order; entry `i` is offered as choice `i + 1`.
    pub const ALL: [Field; 7] = [
        Field::PacketSize,
        Field::TcpWindowSize,
        Field::TcpFlags,
        Field::TlsVersion,
        Field::TlsLength,
        Field::IpLength,
        Field::IpTtl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::PacketSize => "Packet Size",
            Field::TcpWindowSize => "TCP Window Size",
            Field::TcpFlags => "TCP Flags",
            Field::TlsVersion => "TLS Version",
            Field::TlsLength => "TLS Length",
            Field::IpLength => "IP Length",
            Field::IpTtl => "IP TTL",
        }
    }

    /// File stem used for the rendered chart, e.g. `TCP_Window_Size`.
    pub fn file_stem(self) -> String {
        self.name().replace(' ', "_")
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuChoice {
    Exit,
    Field(Field),
    Invalid,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input == "0" {
            return MenuChoice::Exit;
        }
        match input.parse::<usize>() {
            Ok(n) if (1..=Field::ALL.len()).contains(&n) => MenuChoice::Field(Field::ALL[n - 1]),
            _ => MenuChoice::Invalid,
        }
    }
}
