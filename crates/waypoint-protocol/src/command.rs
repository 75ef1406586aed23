//! Command-line parsing helpers.
//!
//! Commands arrive as `\n`-terminated ASCII lines; after trimming, the first
//! space-separated token names the command and the rest are arguments. The
//! connection engine dispatches on the command token itself so that state
//! checks (IDENTIFY-before-REGISTER) happen before argument validation.

use crate::error::{ClientError, E_BAD_CHANNEL, E_BAD_TOPIC, E_INVALID};
use crate::names;

/// Split a trimmed command line into its command token and arguments.
#[must_use]
pub fn split_command_line(line: &str) -> (&str, Vec<&str>) {
    let mut parts = line.split(' ');
    let command = parts.next().unwrap_or("");
    (command, parts.collect())
}

/// Extract and validate the `<topic> [<channel>]` arguments of REGISTER and
/// UNREGISTER.
///
/// # Errors
///
/// Fatal `E_INVALID` when no topic is given, `E_BAD_TOPIC` /
/// `E_BAD_CHANNEL` when a name fails validation.
pub fn get_topic_channel(
    command: &str,
    params: &[&str],
) -> Result<(String, Option<String>), ClientError> {
    let Some(&topic) = params.first() else {
        return Err(ClientError::fatal(
            E_INVALID,
            format!("{command} insufficient number of params"),
        ));
    };
    let channel = params.get(1).copied().filter(|c| !c.is_empty());

    if !names::is_valid_topic_name(topic) {
        return Err(ClientError::fatal(
            E_BAD_TOPIC,
            format!("{command} topic name '{topic}' is not valid"),
        ));
    }

    if let Some(channel) = channel {
        if !names::is_valid_channel_name(channel) {
            return Err(ClientError::fatal(
                E_BAD_CHANNEL,
                format!("{command} channel name '{channel}' is not valid"),
            ));
        }
    }

    Ok((topic.to_string(), channel.map(str::to_string)))
}
