//! Line commands typed at the console

use cablevoice_core::{AudioDevice, Route, StatusEvent};
use std::fmt::Write as _;

/// What a line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Speak the text on a route
    Speak { text: String, route: Route },
    /// Print the output devices seen at startup
    Devices,
    /// Print the command summary
    Help,
    /// Leave after draining pending speech
    Quit,
    /// A slash command we do not know
    Unknown(String),
}

pub const HELP: &str = "\
Type text and press Enter to speak it into the cable.
  /default <text>  speak on the default output instead
  /devices         list output devices
  /help            show this help
  /quit            exit (Ctrl-D works too)";

/// Parse one input line.
///
/// Plain lines, blank ones included, go to the cable; the pipeline reports
/// blank text back as a status message.
pub fn parse(line: &str) -> Command {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Speak {
            text: line.to_string(),
            route: Route::Cable,
        };
    };

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match name {
        "default" | "d" => Command::Speak {
            text: args.to_string(),
            route: Route::DefaultOutput,
        },
        "devices" => Command::Devices,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// One status line for the console
pub fn render_event(event: &StatusEvent) -> String {
    format!("[#{}] {}", event.request, event.update)
}

/// Device listing with the resolved cable marked
pub fn render_devices(devices: &[AudioDevice], cable: Option<usize>) -> String {
    if devices.is_empty() {
        return "No output devices found.".to_string();
    }
    let mut out = String::new();
    for device in devices {
        let marker = if Some(device.index) == cable { " (cable)" } else { "" };
        let _ = writeln!(out, "  {device}{marker}");
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cablevoice_core::StatusUpdate;

    #[test]
    fn test_plain_line_speaks_on_cable() {
        assert_eq!(
            parse("Привет, мир"),
            Command::Speak {
                text: "Привет, мир".to_string(),
                route: Route::Cable
            }
        );
    }

    #[test]
    fn test_blank_line_is_passed_through() {
        assert_eq!(
            parse("   "),
            Command::Speak {
                text: "   ".to_string(),
                route: Route::Cable
            }
        );
    }

    #[test]
    fn test_default_route_command() {
        assert_eq!(
            parse("/default hello there"),
            Command::Speak {
                text: "hello there".to_string(),
                route: Route::DefaultOutput
            }
        );
        assert_eq!(
            parse("/default"),
            Command::Speak {
                text: String::new(),
                route: Route::DefaultOutput
            }
        );
    }

    #[test]
    fn test_control_commands() {
        assert_eq!(parse("/devices"), Command::Devices);
        assert_eq!(parse("  /quit"), Command::Quit);
        assert_eq!(parse("/help"), Command::Help);
        assert_eq!(parse("/volume 3"), Command::Unknown("volume".to_string()));
    }

    #[test]
    fn test_render_event() {
        let event = StatusEvent {
            request: 3,
            update: StatusUpdate::Done,
        };
        assert_eq!(render_event(&event), "[#3] Done.");
    }

    #[test]
    fn test_render_devices_marks_cable() {
        let devices = vec![
            AudioDevice {
                index: 0,
                name: "Speakers".to_string(),
                max_output_channels: 2,
            },
            AudioDevice {
                index: 4,
                name: "Line 1 (Virtual Audio Cable)".to_string(),
                max_output_channels: 2,
            },
        ];
        let text = render_devices(&devices, Some(4));
        assert!(text.contains("0: Speakers\n"));
        assert!(text.ends_with("4: Line 1 (Virtual Audio Cable) (cable)"));
        assert_eq!(render_devices(&[], None), "No output devices found.");
    }
}
