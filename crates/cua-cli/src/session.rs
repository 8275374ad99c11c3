use anyhow::Result;
use cliclack::{input, intro, outro};
use console::style;
use cua::agent::Agent;
use cua::models::message::Message;
use cua::models::role::Role;

use crate::render::ConsoleCallbacks;

enum Command {
    Message(String),
    Clear,
    ToggleTheme,
    Help,
    Exit,
}

fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let command = match text.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => Command::Exit,
        "/clear" => Command::Clear,
        "/t" => Command::ToggleTheme,
        "/?" | "/help" => Command::Help,
        _ => Command::Message(text.to_string()),
    };
    Some(command)
}

/// A conversation with the agent in the terminal
pub struct Session {
    agent: Agent,
    callbacks: ConsoleCallbacks,
    messages: Vec<Message>,
}

impl Session {
    pub fn new(agent: Agent, callbacks: ConsoleCallbacks) -> Self {
        Self {
            agent,
            callbacks,
            messages: Vec::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        intro(format!("cua {}", style(&self.agent.config().model).dim()))?;
        println!("{}", style("Type /? for help, Ctrl+C interrupts a running turn").dim());

        loop {
            let text: String = input("Task:").placeholder("").interact()?;
            match parse_command(&text) {
                None => continue,
                Some(Command::Exit) => break,
                Some(Command::Clear) => {
                    self.messages.clear();
                    println!("Conversation cleared");
                }
                Some(Command::ToggleTheme) => {
                    self.callbacks.theme = self.callbacks.theme.toggle();
                }
                Some(Command::Help) => {
                    println!("Commands:");
                    println!("/exit - Exit the session");
                    println!("/clear - Start a new conversation");
                    println!("/t - Toggle Light/Dark theme");
                    println!("/? - Display this help message");
                    println!("Ctrl+C - Interrupt the agent (resets the conversation to before the interrupted task)");
                }
                Some(Command::Message(text)) => {
                    self.messages.push(Message::user().with_text(text));
                    self.process().await;
                }
            }
        }

        outro("Session closed")?;
        Ok(())
    }

    /// Run a single task without any interaction
    pub async fn headless_start(&mut self, task: String) -> Result<()> {
        self.messages.push(Message::user().with_text(task));
        self.process().await;

        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => Ok(()),
            _ => Err(anyhow::anyhow!("The task ended without an answer from the model")),
        }
    }

    async fn process(&mut self) {
        let Session {
            agent,
            callbacks,
            messages,
        } = self;
        let seed = messages.clone();

        tokio::select! {
            conversation = agent.sampling_loop(seed, callbacks) => {
                *messages = conversation;
            }
            _ = tokio::signal::ctrl_c() => {
                // Drop the interrupted task along with whatever it produced
                while let Some(message) = messages.pop() {
                    if message.role == Role::User {
                        break;
                    }
                }
                println!(
                    "{}",
                    style("Interrupt: resetting conversation to before the last task").yellow()
                );
            }
        }
    }
}
