use ratatui::style::Color;

/// Prompt-template artifact some upstream models prepend to their answer.
pub const HEADER_TOKEN: &str = "<|start_header_id|>assistant<|end_header_id|>";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/chat";
/// Five question/answer exchanges.
pub const DEFAULT_MAX_HISTORY: usize = 10;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 256 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_EXPORT_PATH: &str = "waqeel-transcript.html";

pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";
pub const INPUT_PLACEHOLDER: &str = "Ask your legal question...";
pub const EMPTY_TITLE: &str = "Ask Your Legal Question";
pub const EMPTY_SUBTITLE: &str =
    "Type your question below and get instant legal guidance with verified references.";
pub const APP_TITLE: &str = "Apna Waqeel - Legal Assistant";

pub const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

pub const COLOR_PURPLE: Color = Color::Rgb(157, 124, 216);
pub const COLOR_GREEN: Color = Color::Rgb(127, 216, 143);
pub const COLOR_ORANGE: Color = Color::Rgb(245, 167, 66);
pub const COLOR_YELLOW: Color = Color::Rgb(229, 192, 123);
pub const COLOR_CYAN: Color = Color::Rgb(86, 182, 194);
pub const COLOR_AMBER: Color = Color::Rgb(251, 191, 36);
pub const COLOR_TEXT: Color = Color::Rgb(224, 224, 224);
pub const COLOR_TEXT_MUTED: Color = Color::Rgb(159, 179, 209);
pub const COLOR_TEXT_DIM: Color = Color::Rgb(111, 122, 143);
pub const COLOR_WARNING: Color = Color::Rgb(245, 158, 11);
pub const COLOR_ERROR: Color = Color::Rgb(248, 113, 113);
pub const COLOR_BG: Color = Color::Rgb(10, 14, 20);
pub const COLOR_BG_ALT: Color = Color::Rgb(15, 22, 36);
pub const COLOR_BORDER: Color = Color::Rgb(27, 35, 51);

pub const WAQEEL_LOGO: [&str; 6] = [
    " ██╗    ██╗ █████╗  ██████╗ ███████╗███████╗██╗     ",
    " ██║    ██║██╔══██╗██╔═══██╗██╔════╝██╔════╝██║     ",
    " ██║ █╗ ██║███████║██║   ██║█████╗  █████╗  ██║     ",
    " ██║███╗██║██╔══██║██║▄▄ ██║██╔══╝  ██╔══╝  ██║     ",
    " ╚███╔███╔╝██║  ██║╚██████╔╝███████╗███████╗███████╗",
    "  ╚══╝╚══╝ ╚═╝  ╚═╝ ╚══▀▀═╝ ╚══════╝╚══════╝╚══════╝",
];

pub const W_LOGO: [&str; 6] = [
    " ██╗    ██╗",
    " ██║    ██║",
    " ██║ █╗ ██║",
    " ██║███╗██║",
    " ╚███╔███╔╝",
    "  ╚══╝╚══╝ ",
];
