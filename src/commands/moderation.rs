//! Moderation commands: kicking, banning and role management

use serenity::all::{
    Context, CreateEmbed, GuildId, Member, Mentionable, Message, Permissions, Role, RoleId,
};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{
    author_has, http_status, is_forbidden, parse_role, parse_user, say, send_embed,
    CommandResult, Invocation,
};

const MOD_NO_PERMISSION: &str = "You don't have permission to use this command.";
const MOD_MISSING_ARGS: &str = "Please specify all required arguments.";
const MOD_INVALID_USER: &str = "Invalid user specified.";

const ROLE_NO_PERMISSION: &str = "You don't have permission to use this command!";
const ROLE_MISSING_ARGS: &str = "Please specify both a user and a role.";
const ROLE_INVALID_ARGS: &str = "Invalid user or role specified. Please check the syntax: `!add_role @user RoleName` or `!remove_role @user RoleName`";

const MEMBERS_PER_FIELD: usize = 20;
const MAX_PERMISSIONS_SHOWN: usize = 10;
const MAX_FIELDS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    Add,
    Remove,
}

impl RoleAction {
    fn verb(self) -> &'static str {
        match self {
            RoleAction::Add => "assign",
            RoleAction::Remove => "remove",
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            RoleAction::Add => "adding",
            RoleAction::Remove => "removing",
        }
    }
}

/// Find a role by exact name, then by mention or id
pub fn resolve_role<'a>(roles: &'a HashMap<RoleId, Role>, query: &str) -> Option<&'a Role> {
    roles
        .values()
        .find(|r| r.name == query)
        .or_else(|| parse_role(query).and_then(|id| roles.get(&id)))
}

/// Position of the highest role among `member_roles`; 0 is @everyone
pub fn top_position(roles: &HashMap<RoleId, Role>, member_roles: &[RoleId]) -> u16 {
    member_roles
        .iter()
        .filter_map(|id| roles.get(id))
        .map(|r| r.position)
        .max()
        .unwrap_or(0)
}

/// Role positions involved in an add/remove request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hierarchy {
    pub role: u16,
    pub bot_top: u16,
    pub author_top: u16,
    pub author_is_owner: bool,
}

/// Both the bot and the author (unless they own the server) must rank above the role
pub fn check_hierarchy(action: RoleAction, h: Hierarchy) -> Result<(), String> {
    if h.bot_top <= h.role {
        return Err(format!(
            "I don't have permission to {verb} this role (my highest role must be above the role you're trying to {verb}).",
            verb = action.verb()
        ));
    }
    if h.author_top <= h.role && !h.author_is_owner {
        return Err(format!(
            "You can't {} a role that is higher than or equal to your highest role.",
            action.verb()
        ));
    }
    Ok(())
}

/// Handle !kick @member [reason]
pub async fn kick(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    remove_member(ctx, msg, inv, false).await
}

/// Handle !ban @member [reason]
pub async fn ban(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    remove_member(ctx, msg, inv, true).await
}

async fn remove_member(ctx: &Context, msg: &Message, inv: &Invocation<'_>, ban: bool) -> CommandResult {
    let required = if ban {
        Permissions::BAN_MEMBERS
    } else {
        Permissions::KICK_MEMBERS
    };
    if !author_has(ctx, msg, required) {
        return say(ctx, msg.channel_id, MOD_NO_PERMISSION).await;
    }
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;

    let Some(arg) = inv.arg(0) else {
        return say(ctx, msg.channel_id, MOD_MISSING_ARGS).await;
    };
    let Some(member) = fetch_member(ctx, guild_id, arg).await else {
        return say(ctx, msg.channel_id, MOD_INVALID_USER).await;
    };
    let reason = inv.text_after(1);

    let result = match (ban, reason.is_empty()) {
        (true, true) => guild_id.ban(&ctx.http, member.user.id, 0).await,
        (true, false) => guild_id.ban_with_reason(&ctx.http, member.user.id, 0, reason).await,
        (false, true) => guild_id.kick(&ctx.http, member.user.id).await,
        (false, false) => guild_id.kick_with_reason(&ctx.http, member.user.id, reason).await,
    };
    result?;

    let verb = if ban { "banned" } else { "kicked" };
    info!("{} {} {} in guild {}", msg.author.name, verb, member.user.name, guild_id);
    say(ctx, msg.channel_id, format!("{} has been {}.", member.mention(), verb)).await
}

/// Handle !unban @user
pub async fn unban(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    if !author_has(ctx, msg, Permissions::ADMINISTRATOR) {
        return say(ctx, msg.channel_id, MOD_NO_PERMISSION).await;
    }
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;

    let Some(arg) = inv.arg(0) else {
        return say(ctx, msg.channel_id, MOD_MISSING_ARGS).await;
    };
    let Some(user_id) = parse_user(arg) else {
        return say(ctx, msg.channel_id, MOD_INVALID_USER).await;
    };

    let reply = match guild_id.unban(&ctx.http, user_id).await {
        Ok(()) => format!("{} has been unbanned.", user_id.mention()),
        Err(e) => {
            warn!("Unban of {} failed: {}", user_id, e);
            match http_status(&e) {
                Some(404) => "User not found in the ban list.".to_string(),
                Some(403) => "I don't have permission to unban this user.".to_string(),
                _ => "Failed to unban the user.".to_string(),
            }
        }
    };
    say(ctx, msg.channel_id, reply).await
}

async fn fetch_member(ctx: &Context, guild_id: GuildId, arg: &str) -> Option<Member> {
    let user_id = parse_user(arg)?;
    guild_id.member(ctx, user_id).await.ok()
}

/// Handle !add_role @member role
pub async fn add_role(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    change_role(ctx, msg, inv, RoleAction::Add).await
}

/// Handle !remove_role @member role
pub async fn remove_role(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    change_role(ctx, msg, inv, RoleAction::Remove).await
}

async fn change_role(ctx: &Context, msg: &Message, inv: &Invocation<'_>, action: RoleAction) -> CommandResult {
    if !author_has(ctx, msg, Permissions::MANAGE_ROLES) {
        return say(ctx, msg.channel_id, ROLE_NO_PERMISSION).await;
    }
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;

    let role_name = inv.text_after(1);
    let Some(user_arg) = inv.arg(0).filter(|_| !role_name.is_empty()) else {
        return say(ctx, msg.channel_id, ROLE_MISSING_ARGS).await;
    };
    let Some(member) = fetch_member(ctx, guild_id, user_arg).await else {
        return say(ctx, msg.channel_id, ROLE_INVALID_ARGS).await;
    };
    let author_roles = match &msg.member {
        Some(partial) => partial.roles.clone(),
        None => guild_id.member(ctx, msg.author.id).await?.roles,
    };
    let bot_id = ctx.cache.current_user().id;
    let bot_roles = guild_id.member(ctx, bot_id).await?.roles;

    let resolved = {
        let guild = ctx.cache.guild(guild_id).ok_or("Server is not cached yet.")?;
        resolve_role(&guild.roles, role_name).map(|role| {
            let hierarchy = Hierarchy {
                role: role.position,
                bot_top: top_position(&guild.roles, &bot_roles),
                author_top: top_position(&guild.roles, &author_roles),
                author_is_owner: guild.owner_id == msg.author.id,
            };
            (role.id, role.name.clone(), hierarchy)
        })
    };
    let Some((role_id, name, hierarchy)) = resolved else {
        return say(ctx, msg.channel_id, format!("Could not find role: {}", role_name)).await;
    };

    if let Err(reason) = check_hierarchy(action, hierarchy) {
        return say(ctx, msg.channel_id, reason).await;
    }

    let has_role = member.roles.contains(&role_id);
    let result = match action {
        RoleAction::Add if has_role => {
            let reply = format!("{} already has the role {}", member.mention(), name);
            return say(ctx, msg.channel_id, reply).await;
        }
        RoleAction::Remove if !has_role => {
            let reply = format!("{} does not have the role {}", member.mention(), name);
            return say(ctx, msg.channel_id, reply).await;
        }
        RoleAction::Add => member.add_role(&ctx.http, role_id).await,
        RoleAction::Remove => member.remove_role(&ctx.http, role_id).await,
    };

    let reply = match result {
        Ok(()) => match action {
            RoleAction::Add => format!("Added role {} to {}", name, member.mention()),
            RoleAction::Remove => format!("Removed role {} from {}", name, member.mention()),
        },
        Err(e) if is_forbidden(&e) => "I don't have permission to manage roles.".to_string(),
        Err(e) => format!("An error occurred while {} the role: {}", action.gerund(), e),
    };
    say(ctx, msg.channel_id, reply).await
}

/// Data shown by !roleinfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: String,
    pub colour: u32,
    pub position: u16,
    pub members: usize,
    pub mentionable: bool,
    pub hoist: bool,
    pub permissions: Vec<String>,
}

impl RoleSummary {
    pub fn of(role: &Role, members: usize) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            colour: role.colour.0,
            position: role.position,
            members,
            mentionable: role.mentionable,
            hoist: role.hoist,
            permissions: role
                .permissions
                .get_permission_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub fn role_info_embed(role: &RoleSummary) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("Role Information: {}", role.name))
        .colour(role.colour)
        .field("ID", role.id.to_string(), true)
        .field("Color", format!("#{:06x}", role.colour), true)
        .field("Position", role.position.to_string(), true)
        .field("Members", role.members.to_string(), true)
        .field("Mentionable", yes_no(role.mentionable), true)
        .field("Hoisted", yes_no(role.hoist), true);

    if !role.permissions.is_empty() {
        let shown: Vec<&str> = role
            .permissions
            .iter()
            .take(MAX_PERMISSIONS_SHOWN)
            .map(String::as_str)
            .collect();
        embed = embed.field("Key Permissions", shown.join("\n"), false);
    }
    embed
}

pub fn role_members_embed(name: &str, colour: u32, members: &[String]) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("Members with role: {}", name))
        .colour(colour)
        .description(format!("Total members: {}", members.len()));

    for (i, chunk) in members.chunks(MEMBERS_PER_FIELD).take(MAX_FIELDS).enumerate() {
        let start = i * MEMBERS_PER_FIELD;
        embed = embed.field(
            format!("Members {}-{}", start + 1, start + chunk.len()),
            chunk.join("\n"),
            false,
        );
    }
    embed
}

/// Role plus the names of its cached members
fn role_with_members(ctx: &Context, guild_id: GuildId, query: &str) -> Option<(Role, Vec<String>)> {
    let guild = ctx.cache.guild(guild_id)?;
    let role = resolve_role(&guild.roles, query)?.clone();
    let mut members: Vec<String> = guild
        .members
        .values()
        .filter(|m| m.roles.contains(&role.id))
        .map(|m| m.user.tag())
        .collect();
    members.sort_unstable();
    Some((role, members))
}

/// Handle !roleinfo role
pub async fn roleinfo(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    if !author_has(ctx, msg, Permissions::MANAGE_ROLES) {
        return say(ctx, msg.channel_id, ROLE_NO_PERMISSION).await;
    }
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if inv.rest.is_empty() {
        return say(ctx, msg.channel_id, MOD_MISSING_ARGS).await;
    }

    match role_with_members(ctx, guild_id, inv.rest) {
        Some((role, members)) => {
            let summary = RoleSummary::of(&role, members.len());
            send_embed(ctx, msg.channel_id, role_info_embed(&summary)).await
        }
        None => say(ctx, msg.channel_id, format!("Could not find role: {}", inv.rest)).await,
    }
}

/// Handle !rolemembers role
pub async fn rolemembers(ctx: &Context, msg: &Message, inv: &Invocation<'_>) -> CommandResult {
    if !author_has(ctx, msg, Permissions::MANAGE_ROLES) {
        return say(ctx, msg.channel_id, ROLE_NO_PERMISSION).await;
    }
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if inv.rest.is_empty() {
        return say(ctx, msg.channel_id, MOD_MISSING_ARGS).await;
    }

    let Some((role, members)) = role_with_members(ctx, guild_id, inv.rest) else {
        return say(ctx, msg.channel_id, format!("Could not find role: {}", inv.rest)).await;
    };
    if members.is_empty() {
        return say(ctx, msg.channel_id, format!("No members have the role {}", role.name)).await;
    }
    send_embed(
        ctx,
        msg.channel_id,
        role_members_embed(&role.name, role.colour.0, &members),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    fn hierarchy(role: u16, bot_top: u16, author_top: u16, author_is_owner: bool) -> Hierarchy {
        Hierarchy {
            role,
            bot_top,
            author_top,
            author_is_owner,
        }
    }

    #[test]
    fn test_hierarchy_checks() {
        assert!(check_hierarchy(RoleAction::Add, hierarchy(2, 5, 4, false)).is_ok());

        let err = check_hierarchy(RoleAction::Add, hierarchy(5, 5, 9, false)).unwrap_err();
        assert_eq!(
            err,
            "I don't have permission to assign this role (my highest role must be above the role you're trying to assign)."
        );

        let err = check_hierarchy(RoleAction::Remove, hierarchy(3, 5, 3, false)).unwrap_err();
        assert_eq!(
            err,
            "You can't remove a role that is higher than or equal to your highest role."
        );

        // The owner may hand out roles above their own
        assert!(check_hierarchy(RoleAction::Add, hierarchy(3, 5, 0, true)).is_ok());
    }

    #[test]
    fn test_role_info_embed() {
        let summary = RoleSummary {
            id: RoleId::new(42),
            name: "Mods".to_string(),
            colour: 0xDA8359,
            position: 3,
            members: 7,
            mentionable: true,
            hoist: false,
            permissions: (1..=12).map(|i| format!("Perm {}", i)).collect(),
        };
        let embed = role_info_embed(&summary);
        assert_eq!(embed_json(&embed)["title"], "Role Information: Mods");

        let fields = fields(&embed);
        assert_eq!(field(&fields, "ID"), Some("42"));
        assert_eq!(field(&fields, "Color"), Some("#da8359"));
        assert_eq!(field(&fields, "Members"), Some("7"));
        assert_eq!(field(&fields, "Mentionable"), Some("True"));
        assert_eq!(field(&fields, "Hoisted"), Some("False"));
        let perms = field(&fields, "Key Permissions").unwrap();
        assert_eq!(perms.lines().count(), 10);
        assert!(!perms.contains("Perm 11"));
    }

    #[test]
    fn test_role_info_without_permissions() {
        let summary = RoleSummary {
            id: RoleId::new(1),
            name: "Plain".to_string(),
            colour: 0,
            position: 1,
            members: 0,
            mentionable: false,
            hoist: false,
            permissions: Vec::new(),
        };
        assert_eq!(field(&fields(&role_info_embed(&summary)), "Key Permissions"), None);
    }

    #[test]
    fn test_role_members_embed_chunks() {
        let members: Vec<String> = (1..=45).map(|i| format!("user{}", i)).collect();
        let embed = role_members_embed("Gamer", 0x00FF00, &members);
        assert_eq!(embed_json(&embed)["description"], "Total members: 45");

        let fields = fields(&embed);
        let names: Vec<&str> = fields.iter().map(|f| f.0.as_str()).collect();
        assert_eq!(names, vec!["Members 1-20", "Members 21-40", "Members 41-45"]);
        assert_eq!(fields[2].1, "user41\nuser42\nuser43\nuser44\nuser45");
    }
}
