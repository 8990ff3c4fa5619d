use anyhow::{Context as _, Result};
use chrono::Utc;
use squadra_core::models::{NewTeam, ProfileUpdate};
use squadra_core::{
    describe_age, AuthEvent, AuthEvents, CacheStore, Cached, Config, Loaded, OfflineRepository,
    Session, SupabaseClient,
};
use tracing::{info, warn};

const USAGE: &str = "\
Usage: squadra <command>

Commands:
  status                     Show cache and session state
  clubs [--mine]             List your clubs (--mine: only clubs you created)
  clubs new <name>           Create a club
  teams <club_id>            List the teams of a club
  teams new <club_id> <name> [--sport S] [--category C] [--level L] [--season YYYY-YYYY]
                             Create a team (season defaults to the current one)
  profile                    Show your profile
  profile set <name> <phone> Update your profile (use \"\" to clear a field)
  login <email>              Email a sign-in code
  verify <email> <code>      Complete sign-in with the emailed code
  logout                     Sign out and clear the local cache
  clear-cache                Delete all locally cached data";

const NOT_CONFIGURED: &str =
    "Backend is not configured (set SQUADRA_SUPABASE_URL and SQUADRA_SUPABASE_ANON_KEY)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Clubs { mine: bool },
    NewClub { name: String },
    Teams { club_id: String },
    NewTeam(TeamArgs),
    Profile,
    SetProfile { name: String, phone_number: String },
    Login { email: String },
    Verify { email: String, code: String },
    Logout,
    ClearCache,
}

impl Command {
    /// Parse arguments (without the program name). The error is the usage text.
    pub fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["status"] => Command::Status,
            ["clubs"] => Command::Clubs { mine: false },
            ["clubs", "--mine"] => Command::Clubs { mine: true },
            ["clubs", "new", name] => Command::NewClub {
                name: name.to_string(),
            },
            ["teams", "new", club_id, name, options @ ..] => {
                Command::NewTeam(TeamArgs::parse(club_id, name, options)?)
            }
            ["teams", club_id] => Command::Teams {
                club_id: club_id.to_string(),
            },
            ["profile"] => Command::Profile,
            ["profile", "set", name, phone] => Command::SetProfile {
                name: name.to_string(),
                phone_number: phone.to_string(),
            },
            ["login", email] => Command::Login {
                email: email.to_string(),
            },
            ["verify", email, code] => Command::Verify {
                email: email.to_string(),
                code: code.to_string(),
            },
            ["logout"] => Command::Logout,
            ["clear-cache"] => Command::ClearCache,
            _ => return Err(USAGE.to_string()),
        };
        Ok(command)
    }
}

/// Arguments of `teams new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamArgs {
    pub club_id: String,
    pub name: String,
    pub sport: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub season: Option<String>,
}

impl TeamArgs {
    fn parse(club_id: &str, name: &str, options: &[&str]) -> std::result::Result<Self, String> {
        let mut args = TeamArgs {
            club_id: club_id.to_string(),
            name: name.to_string(),
            ..TeamArgs::default()
        };
        for pair in options.chunks(2) {
            let [flag, value] = pair else {
                return Err(USAGE.to_string());
            };
            let slot = match *flag {
                "--sport" => &mut args.sport,
                "--category" => &mut args.category,
                "--level" => &mut args.level,
                "--season" => &mut args.season,
                _ => return Err(USAGE.to_string()),
            };
            *slot = Some(value.to_string());
        }
        Ok(args)
    }

    fn into_new_team(self, created_by: Option<String>) -> NewTeam {
        let mut team = NewTeam::new(&self.club_id, &self.name, Utc::now().date_naive());
        if let Some(season) = self.season {
            team.season = season;
        }
        team.sport = self.sport;
        team.category = self.category;
        team.level = self.level;
        team.created_by = created_by;
        team
    }
}

/// Services shared by all commands, built once in `main`.
pub struct Context {
    pub config: Config,
    pub session: Session,
    pub cache: CacheStore,
}

impl Context {
    fn client(&self) -> Result<SupabaseClient> {
        let client =
            SupabaseClient::new(&self.config.supabase_url, &self.config.supabase_anon_key)
                .context(NOT_CONFIGURED)?;
        Ok(match self.session.token() {
            Some(token) => client.with_token(token.to_string()),
            None => client,
        })
    }

    fn repository(&self) -> Result<OfflineRepository<SupabaseClient>> {
        Ok(OfflineRepository::new(self.client()?, self.cache.clone()))
    }

    /// Renew the access token when it is about to expire. Failures leave
    /// the session as it was.
    async fn refresh_session_if_due(&mut self) {
        let Some(current) = self.session.refresh_due(self.config.auto_refresh_token).cloned() else {
            return;
        };
        if !self.config.is_backend_configured() {
            return;
        }
        let refreshed = match self.client() {
            Ok(client) => client.refresh_session(&current).await,
            Err(e) => Err(e),
        };
        match refreshed {
            Ok(data) => {
                info!(minutes = data.minutes_until_expiry(), "Session refreshed");
                self.session.update(data.clone());
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save refreshed session");
                }
                if let Ok(repo) = self.repository() {
                    publish(&repo, AuthEvent::TokenRefreshed(data)).await;
                }
            }
            Err(e) => warn!(error = %e, "Failed to refresh session"),
        }
    }

    fn require_user_id(&self) -> Result<String> {
        self.session
            .user_id()
            .filter(|_| self.session.is_valid())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `squadra login <email>` first."))
    }
}

/// Deliver one auth event through the event stream to the repository.
async fn publish(repo: &OfflineRepository<SupabaseClient>, event: AuthEvent) {
    let events = AuthEvents::new();
    let rx = events.subscribe();
    let emit = async move {
        events.emit(event);
        // Dropping the only sender ends the watch loop once the event is applied
    };
    tokio::join!(repo.watch_auth(rx), emit);
}

fn origin_note<T>(loaded: &Loaded<T>) {
    if !loaded.is_offline() {
        return;
    }
    match loaded.age_display() {
        Some(age) if loaded.is_stale() => {
            println!("(offline - cached data from {}, may be out of date)", age)
        }
        Some(age) => println!("(offline - cached data from {})", age),
        None => println!("(offline - nothing cached yet)"),
    }
}

fn last_synced<T>(rows: &[Cached<T>]) -> String {
    rows.iter()
        .map(|r| r.synced_at)
        .max()
        .map(|t| describe_age(Utc::now() - t))
        .unwrap_or_else(|| "never".to_string())
}

fn print_clubs(loaded: &Loaded<Vec<squadra_core::models::Club>>) {
    origin_note(loaded);
    if loaded.data.is_empty() {
        println!("No clubs yet.");
    }
    for club in &loaded.data {
        println!("{}  {}  (created {})", club.id, club.name, club.created_at);
    }
}

pub async fn run(command: Command, ctx: &mut Context) -> Result<()> {
    if !matches!(command, Command::ClearCache | Command::Logout) {
        ctx.refresh_session_if_due().await;
    }

    match command {
        Command::Status => status(ctx).await,
        Command::Clubs { mine: false } => {
            print_clubs(&ctx.repository()?.clubs().await);
            Ok(())
        }
        Command::Clubs { mine: true } => {
            let user_id = ctx.require_user_id()?;
            print_clubs(&ctx.repository()?.clubs_created_by(&user_id).await);
            Ok(())
        }
        Command::NewClub { name } => {
            let user_id = ctx.require_user_id()?;
            let club = ctx
                .repository()?
                .create_club(&name, &user_id)
                .await
                .context("Failed to create club")?;
            println!("Created club {} ({}).", club.name, club.id);
            Ok(())
        }
        Command::NewTeam(args) => {
            let user_id = ctx.require_user_id()?;
            let team = args.into_new_team(Some(user_id));
            let created = ctx
                .repository()?
                .create_team(&team)
                .await
                .context("Failed to create team")?;
            println!("Created team {} ({}) for {}.", created.name, created.id, team.season);
            Ok(())
        }
        Command::Teams { club_id } => {
            let loaded = ctx.repository()?.teams_for_club(&club_id).await;
            origin_note(&loaded);
            if loaded.data.is_empty() {
                println!("No teams in this club.");
            }
            for team in &loaded.data {
                println!("{}  {}", team.id, team.name);
            }
            Ok(())
        }
        Command::Profile => {
            let user_id = ctx.require_user_id()?;
            let loaded = ctx.repository()?.user_profile(&user_id).await;
            origin_note(&loaded);
            match loaded.data {
                Some(profile) => {
                    println!("Name:  {}", profile.display_name());
                    println!("Email: {}", profile.email);
                    println!("Phone: {}", profile.phone_number.as_deref().unwrap_or("-"));
                }
                None => println!("No profile found."),
            }
            Ok(())
        }
        Command::SetProfile { name, phone_number } => {
            let user_id = ctx.require_user_id()?;
            let update = ProfileUpdate::new(&name, &phone_number);
            let profile = ctx
                .repository()?
                .update_user_profile(&user_id, &update)
                .await
                .context("Failed to update profile")?;
            println!("Profile updated: {}", profile.display_name());
            Ok(())
        }
        Command::Login { email } => {
            ctx.client()?.send_magic_link(&email, None).await?;
            ctx.config.last_email = Some(email.clone());
            if let Err(e) = ctx.config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Sign-in code sent to {}. Run `squadra verify {} <code>`.", email, email);
            Ok(())
        }
        Command::Verify { email, code } => {
            let data = ctx.client()?.verify_otp(&email, &code).await?;
            ctx.session.update(data.clone());
            ctx.session.save().context("Failed to save session")?;
            publish(&ctx.repository()?, AuthEvent::SignedIn(data)).await;
            println!("Signed in as {}.", email);
            Ok(())
        }
        Command::Logout => {
            // Local state goes first so logout works without a backend
            let token_client = ctx.client();
            ctx.session.clear()?;
            if let Err(e) = ctx.cache.clear_all().await {
                warn!(error = %e, "Failed to clear local cache on sign-out");
            }
            match token_client {
                Ok(client) => {
                    if let Err(e) = client.sign_out().await {
                        warn!(error = %e, "Remote sign-out failed");
                    }
                }
                Err(e) => warn!(error = %e, "Skipping remote sign-out"),
            }
            println!("Signed out.");
            Ok(())
        }
        Command::ClearCache => {
            ctx.cache.clear_all().await?;
            println!("Local cache cleared.");
            Ok(())
        }
    }
}

async fn status(ctx: &Context) -> Result<()> {
    let coordinator = ctx.cache.coordinator();
    println!("Cache:   {} ({})", coordinator.phase().label(), coordinator.location());

    match ctx.cache.counts().await {
        Ok(counts) => {
            println!(
                "Rows:    {} clubs, {} teams, {} memberships, {} profiles",
                counts.clubs, counts.teams, counts.memberships, counts.users
            );
            if let Ok(clubs) = ctx.cache.get_clubs().await {
                println!("Synced:  {}", last_synced(&clubs));
            }
        }
        Err(e) => println!("Rows:    unavailable ({})", e),
    }

    match ctx.session.data.as_ref() {
        Some(data) if !data.is_expired() => println!(
            "Session: {} (expires in {}m)",
            data.email,
            data.minutes_until_expiry()
        ),
        _ => println!("Session: signed out"),
    }
    Ok(())
}
