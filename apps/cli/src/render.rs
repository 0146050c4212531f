use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tubechat_core::{Author, Fragment, Message, Phase, SessionSnapshot, fragments};

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn render_text(message: &Message) -> String {
    fragments(&message.text, message.timestamps.as_deref())
        .into_iter()
        .map(|f| match f {
            Fragment::Text(text) => text,
            Fragment::Jump(c) => style(format!("[{}]", c.label))
                .cyan()
                .underlined()
                .to_string(),
            Fragment::Inert(marker) => style(marker).dim().to_string(),
        })
        .collect()
}

#[derive(Default)]
struct Printer {
    video: Option<String>,
    printed: usize,
    user_turns: usize,
    phase: Option<Phase>,
    questions_shown: bool,
    spinner: Option<ProgressBar>,
}

impl Printer {
    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn render(&mut self, s: &SessionSnapshot) {
        self.stop_spinner();

        if s.video_id != self.video {
            self.video = s.video_id.clone();
            self.printed = 0;
            self.user_turns = 0;
            self.questions_shown = false;
            if let Some(video_id) = &self.video {
                println!(
                    "\n{} {}",
                    style("▶ Video").cyan().bold(),
                    style(video_id).yellow()
                );
            }
        }
        if s.messages.len() < self.printed {
            self.printed = 0;
            self.user_turns = 0;
            self.questions_shown = false;
        }

        if self.phase != Some(s.phase) {
            self.phase = Some(s.phase);
            match s.phase {
                Phase::NoCredential => println!(
                    "{} No API key. Use {} or set TUBECHAT_API_KEY.",
                    style("!").yellow().bold(),
                    style("/key <api-key>").bold()
                ),
                Phase::AwaitingVideo => println!(
                    "{} Open a video with {}",
                    style("·").dim(),
                    style("/video <url>").bold()
                ),
                _ => {}
            }
        }

        for message in &s.messages[self.printed..] {
            self.print_message(message);
        }
        self.printed = s.messages.len();

        if !self.questions_shown && !s.quick_questions.is_empty() {
            self.questions_shown = true;
            println!("{}", style("  Quick questions").dim());
            for (i, q) in s.quick_questions.iter().enumerate() {
                println!("  {} {}", style(format!("/q {}", i + 1)).cyan(), q);
            }
        }

        if s.loading_transcript {
            self.spinner = Some(create_spinner("Loading transcript..."));
        } else if s.awaiting_answer {
            self.spinner = Some(create_spinner(&format!(
                "Thinking ({})...",
                s.selected_model
            )));
        }
    }

    fn print_message(&mut self, message: &Message) {
        match message.author {
            Author::User => {
                self.user_turns += 1;
                let model = message.model.map(|m| m.to_string()).unwrap_or_default();
                println!(
                    "\n{} {} {}",
                    style(format!("#{}", self.user_turns)).dim(),
                    style("you").bold(),
                    style(format!("({model})")).dim()
                );
                println!("  {}", message.text);
            }
            Author::Assistant if message.is_error => {
                println!("\n{}", style("bot").red().bold());
                println!("  {}", style(&message.text).red());
            }
            Author::Assistant => {
                println!("\n{}", style("bot").cyan().bold());
                println!("  {}", render_text(message));
                if !message.citations.is_empty() {
                    let jumps = message
                        .citations
                        .iter()
                        .map(|c| format!("/seek {}", c.label))
                        .collect::<Vec<_>>()
                        .join("  ");
                    println!("  {}", style(jumps).dim());
                }
            }
        }
    }
}

/// Print every snapshot until the session goes away.
pub async fn run(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut printer = Printer::default();
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        printer.render(&snapshot);
        if snapshots.changed().await.is_err() {
            break;
        }
    }
    printer.stop_spinner();
}
