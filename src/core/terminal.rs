use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static KEY_ICON: Emoji<'_, '_> = Emoji("🔑 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_credential(label: &str, msg: &str) {
    println!("  {} {}: {}", KEY_ICON, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

enum GuideLine {
    Command(String, String),
    Status(String, String),
    Hint(String, String),
    Text(String),
    Blank,
}

/// A titled block of help text, printed in one go.
pub struct GuideSection {
    title: String,
    lines: Vec<GuideLine>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, about: &str) -> Self {
        self.lines
            .push(GuideLine::Command(name.to_string(), about.to_string()));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines
            .push(GuideLine::Status(label.to_string(), value.to_string()));
        self
    }

    pub fn hint(mut self, example: &str, about: &str) -> Self {
        self.lines
            .push(GuideLine::Hint(example.to_string(), about.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Text(text.to_string()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(GuideLine::Blank);
        self
    }

    pub fn render(&self) -> Vec<String> {
        let width = self
            .lines
            .iter()
            .filter_map(|l| match l {
                GuideLine::Command(name, _) => Some(name.chars().count()),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        let mut out = vec![format!("{}", style(&self.title).bold().underlined())];
        for line in &self.lines {
            out.push(match line {
                GuideLine::Command(name, about) => format!(
                    "  {}  {}",
                    style(format!("{:<width$}", name, width = width)).green(),
                    about
                ),
                GuideLine::Status(label, value) => {
                    format!("  {}: {}", style(label).bold().cyan(), value)
                }
                GuideLine::Hint(example, about) if about.is_empty() => {
                    format!("  {} {}", style("$").dim(), example)
                }
                GuideLine::Hint(example, about) => {
                    format!("  {} {}  {}", style("$").dim(), example, style(about).dim())
                }
                GuideLine::Text(text) => format!("  {}", text),
                GuideLine::Blank => String::new(),
            });
        }
        out
    }

    pub fn print(&self) {
        println!();
        for line in self.render() {
            println!("{}", line);
        }
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        " _        _                  _           _    ",
        "| |_ ___ | | _____ _ __   __| | ___  ___| | __",
        "| __/ _ \\| |/ / _ \\ '_ \\ / _` |/ _ \\/ __| |/ /",
        "| || (_) |   <  __/ | | | (_| |  __/ (__|   < ",
        " \\__\\___/|_|\\_\\___|_| |_|\\__,_|\\___|\\___|_|\\_\\",
    ];

    // Gradient: #5865f2 → #a78bfa → #22d3ee (diagonal top-left → bottom-right)
    let stops: [(u8, u8, u8); 3] = [(88, 101, 242), (167, 139, 250), (34, 211, 238)];
    let max_w = 47u32;
    let max_d = max_w + 4 * 10;

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let d = ((x as u32 + y as u32 * 10) * 1000 / max_d).min(1000);
            let (r, g, b) = if d <= 500 {
                lerp_color(stops[0], stops[1], d * 2)
            } else {
                lerp_color(stops[1], stops[2], (d - 500) * 2)
            };
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;34;211;238mOne vault, every panel.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

pub fn print_goodbye() {
    println!("\n{} {}", SPARKLE, style("Done. Your tokens stay on this machine.").bold().cyan());
}
