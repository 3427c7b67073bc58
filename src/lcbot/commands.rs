use crate::lcapi::ActivitySource;
use crate::lcdb::TrackingStore;

use anyhow::{Context, Result, anyhow};
use serenity::model::channel::Message;

const MAX_CMD_LENGTH: usize = 12;
const RECENT_LOOKBACK: usize = 20;

struct CommandInstance<'a> {
    msg: &'a Message,
    ctx: &'a serenity::client::Context,
    commands: &'a Commands<'a>,

    parameters: &'a [&'a str],
}

/// The chat-facing side of the administrative actions.
pub struct Commands<'a> {
    pub store: &'a dyn TrackingStore,
    pub source: &'a dyn ActivitySource,
    pub call_token: char,
}

impl Commands<'_> {
    pub async fn run_command(&self, ctx: &serenity::client::Context, msg: &Message) -> Result<String> {

        // Split the message's content (on whitespace) into:
        // - The command (first token)
        // - Its parameters (all tokens afterwards)

        // Skip the call token
        let input = &msg.content[self.call_token.len_utf8()..];
        let split_tokens = input.split_whitespace().collect::<Vec<_>>();
        let Some((&command, parameters)) = split_tokens.split_first() else {
            return Err(anyhow!("Expected a command, see {}help for commands.", self.call_token));
        };

        let cmd = CommandInstance { msg, ctx, commands: self, parameters };

        // Execute the command
        let result: String = match command {
                "audit" => cmd.audit().await?,
               "recent" => cmd.recent().await?,
            "tracklist" => cmd.tracklist()?,
                 "link" => cmd.link().await?,
               "unlink" => cmd.unlink().await?,
              "channel" => cmd.channel()?,
                 "help" => self.get_help(),
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!(
                        "No such command found: {}, see {}help for commands.",
                        command, self.call_token
                    ));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

impl CommandInstance<'_> {
    fn username(&self, purpose: &str) -> Result<&str> {
        self.parameters
            .first()
            .copied()
            .with_context(|| format!("Expected LeetCode username for {purpose}, got none."))
    }

    fn guild_id(&self) -> Result<u64> {
        self.msg.guild_id
            .map(|guild| guild.get())
            .context("This command only works inside a server.")
    }

    async fn audit(&self) -> Result<String> {
        let username = self.username("audit")?;

        let profile = self.commands.source
            .fetch_profile(username)
            .await?
            .with_context(|| format!("Could not find leetcode user: {username}"))?;

        let mut output = format!("{profile}\n");
        if let Some(guild_id) = self.msg.guild_id.map(|guild| guild.get()) {
            let links = self.commands.store
                .query_guild_accounts(guild_id)?
                .into_iter()
                .filter(|account| account.username.eq_ignore_ascii_case(&profile.username))
                .count();

            output += &match links {
                0 => String::from("This user is not currently being tracked here."),
                _ => String::from("This user is currently being tracked here."),
            };
        }

        Ok(output)
    }

    async fn recent(&self) -> Result<String> {
        let username = self.username("recent")?;

        let submissions = self.commands.source
            .fetch_recent_submissions(username, RECENT_LOOKBACK)
            .await?;

        Ok(format!(
            "{}",
            submissions
                .iter()
                .find(|sub| sub.is_accepted())
                .with_context(|| format!("No recently completed problems for {}", username))?
        ))
    }

    async fn link(&self) -> Result<String> {
        let guild_id = self.guild_id()?;
        let username = self.username("linking")?;

        let profile = self.commands.source
            .fetch_profile(username)
            .await?
            .with_context(|| format!("Could not find leetcode user: {username}"))?;

        self.commands.store
            .link_account(self.msg.author.id.get(), guild_id, &profile.username, Some(&profile))
            .inspect_err(|_| log::error!("Could not link user {username}"))?;

        self.react_ok().await
    }

    async fn unlink(&self) -> Result<String> {
        let guild_id = self.guild_id()?;

        if !self.commands.store.unlink_account(self.msg.author.id.get(), guild_id)? {
            return Ok(String::from("You don't have a LeetCode account linked here."));
        }

        self.react_ok().await
    }

    fn channel(&self) -> Result<String> {
        let guild_id = self.guild_id()?;

        match self.parameters.first() {
            Some(&"off") => {
                self.commands.store.set_destination(guild_id, None)?;
                Ok(String::from("Announcements are now off for this server."))
            }
            Some(other) => Err(anyhow!(
                "Expected usage: `{t}channel` or `{t}channel off`, got `{other}`",
                t = self.commands.call_token
            )),
            None => {
                let channel_id = self.msg.channel_id.get();
                self.commands.store.set_destination(guild_id, Some(channel_id))?;
                Ok(format!("Announcements will be posted in <#{channel_id}>."))
            }
        }
    }

    fn tracklist(&self) -> Result<String> {
        let guild_id = self.guild_id()?;

        let mut output = String::from("**Tracked users:**");
        match self.commands.store.query_guild_accounts(guild_id) {
            Ok(accounts) => {
                for account in accounts {
                    output += &format!(
                        "\n\t{} (solved {}, streak {})",
                        account.username, account.total_solved, account.streak
                    );
                }
            }
            Err(err) => {
                output = format!("Error retrieving tracklist: {err}");
            }
        }

        Ok(output)
    }

    async fn react_ok(&self) -> Result<String> {
        self.msg.react(
            &self.ctx.http,
            serenity::all::ReactionType::Unicode(String::from("✅")),
        )
        .await?;

        Ok(String::from(""))
    }
}

/// Non-async helpers
impl Commands<'_> {
    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH
            && regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$")
                .is_ok_and(|re| re.is_match(s))
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help(&self) -> String {
        let t = self.call_token;
        format!(
            r#"
**Command List:**
`{t}link <leetcode username>`:  Link your LeetCode account. New solves will be announced in this server.
`{t}unlink`:  Unlink your LeetCode account from this server.
`{t}channel`:  Announce solves and daily reports in this channel. `{t}channel off` stops announcements.
`{t}tracklist`:  List all tracked users in this server.
`{t}audit <leetcode username>`:  Get stats on a leetcode user.
`{t}recent <leetcode username>`:  Get the most recent accepted submission from a leetcode user.
`{t}help`:  Get information on supported commands
"#,
        )
    }
}
