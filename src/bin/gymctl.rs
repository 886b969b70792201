// Terminal front-end for the gym admin dashboard

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colorful::{Color, Colorful};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gym_admin_client::access::{authorize, visible_sections, Access, Section};
use gym_admin_client::actions::{Interaction, Mutation, MutationKind, MutationOutcome, SubscribeSelection};
use gym_admin_client::forms::{Attachment, FormSubmit, MemberForm, Modal, PackageForm, UserForm};
use gym_admin_client::listing::{
    AttendanceHistory, DateRange, ListView, MemberDirectory, PackageCatalog, PageSource, Refresh,
    ServerQuery, StaffDirectory, StatusFilter,
};
use gym_admin_client::structs::{MemberId, PackageId, UserId};
use gym_admin_client::{
    Client, ClientOptions, Config, FileTokenStore, GymError, Session, StaffRole,
};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "gymctl")]
#[command(about = "Gym admin dashboard in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as an admin or staff account
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in identity and the sections it can open
    Whoami,

    /// Dashboard counters and the seven-day attendance chart
    Stats,

    /// List members
    Members {
        /// Case-insensitive name or email filter
        #[arg(short, long, default_value = "")]
        search: String,

        /// all, active or inactive
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },

    /// List staff or trainer accounts
    Users {
        /// staff or trainer
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,

        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Browse the attendance history
    Attendance {
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// List membership plans
    Packages,

    /// Put a member on a plan, starting today
    Subscribe { member: MemberId, package: PackageId },

    /// Register a new member
    AddMember {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Plan to start on
        #[arg(long)]
        package: Option<PackageId>,
        /// Profile picture to upload
        #[arg(long)]
        picture: Option<PathBuf>,
    },

    /// Change a member's details
    EditMember {
        id: MemberId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        /// New password. Left unchanged when omitted.
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long, conflicts_with = "no_package")]
        package: Option<PackageId>,
        /// Take the member off their plan
        #[arg(long)]
        no_package: bool,
    },

    DeleteMember { id: MemberId },

    /// Activate or deactivate a member
    ToggleMember { id: MemberId },

    /// Create a staff or trainer account
    AddUser {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,
    },

    /// Change a staff or trainer account
    EditUser {
        id: UserId,
        /// Role the account currently has
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        /// New password. Left unchanged when omitted.
        #[arg(short, long)]
        password: Option<String>,
    },

    DeleteUser {
        id: UserId,
        /// Role the account currently has
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,
    },

    /// Activate or deactivate a staff or trainer account
    ToggleUser {
        id: UserId,
        /// Role the account currently has
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,
    },

    /// Create a membership plan
    AddPackage {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "30")]
        days: u32,
        #[arg(long, default_value = "0")]
        price: f64,
    },

    /// Change a membership plan
    EditPackage {
        id: PackageId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(long)]
        price: Option<f64>,
    },

    DeletePackage { id: PackageId },
}

impl Commands {
    /// Section a command belongs to, `None` for session commands.
    fn section(&self) -> Option<Section> {
        match self {
            Commands::Login { .. } | Commands::Logout | Commands::Whoami => None,
            Commands::Stats => Some(Section::Dashboard),
            Commands::Members { .. }
            | Commands::Subscribe { .. }
            | Commands::AddMember { .. }
            | Commands::EditMember { .. }
            | Commands::DeleteMember { .. }
            | Commands::ToggleMember { .. } => Some(Section::Members),
            Commands::Users { .. }
            | Commands::AddUser { .. }
            | Commands::EditUser { .. }
            | Commands::DeleteUser { .. }
            | Commands::ToggleUser { .. } => Some(Section::Users),
            Commands::Attendance { .. } => Some(Section::Attendance),
            Commands::Packages
            | Commands::AddPackage { .. }
            | Commands::EditPackage { .. }
            | Commands::DeletePackage { .. } => Some(Section::Packages),
        }
    }
}

/// Prompts on stdin, reports on stderr.
struct Terminal {
    assume_yes: bool,
}

impl Interaction for Terminal {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        print!("{} {prompt} [y/N] ", "[?]".color(Color::Yellow));
        io::stdout().flush().ok();

        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn notify(&self, message: &str) {
        eprintln!("{} {message}", "[ERROR]".color(Color::Red));
    }
}

const DELETE_MEMBER: Mutation = Mutation::new(MutationKind::Delete, "member");
const TOGGLE_MEMBER: Mutation = Mutation::new(MutationKind::Toggle, "member");
const DELETE_USER: Mutation = Mutation::new(MutationKind::Delete, "user");
const TOGGLE_USER: Mutation = Mutation::new(MutationKind::Toggle, "user");
const DELETE_PACKAGE: Mutation = Mutation::new(MutationKind::Delete, "package");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {err}", "[ERROR]".color(Color::Red));
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<AlreadyReported>() => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {err}", "[ERROR]".color(Color::Red));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &Config) -> CliResult {
    let session = Arc::new(Session::restore(FileTokenStore::new(&config.token_path))?);
    let client = Client::new(ClientOptions::from(config), session.clone())?;
    let ui = Terminal {
        assume_yes: cli.yes,
    };

    tracing::debug!(api = client.base_url(), "Starting gymctl");

    if let Some(section) = cli.command.section() {
        if let Access::Denied { reason } = authorize(session.identity().as_ref(), section) {
            println!(
                "{} {}: {reason}",
                "Access Denied".color(Color::Red).bold(),
                section.title()
            );
            return Ok(());
        }
    }

    match cli.command {
        Commands::Login { email, password } => {
            let identity = session.sign_in(&client, &email, &password).await?;
            println!(
                "{} Signed in as {} ({})",
                "[AUTH]".gradient_with_color(Color::Cyan, Color::SpringGreen4),
                identity.email.as_deref().unwrap_or(&email),
                identity.role
            );
        }
        Commands::Logout => {
            session.logout()?;
            println!("Signed out.");
        }
        Commands::Whoami => match session.identity() {
            Some(identity) => {
                println!("Role: {}", identity.role);
                if let Some(email) = &identity.email {
                    println!("Email: {email}");
                }
                if let Some(expires_at) = identity.expires_at {
                    let note = if identity.is_expired(Utc::now()) { " (expired)" } else { "" };
                    println!("Token expires: {}{note}", expires_at.format("%Y-%m-%d %H:%M UTC"));
                }
                let sections: Vec<&str> = visible_sections(Some(&identity))
                    .iter()
                    .map(Section::title)
                    .collect();
                println!("Sections: {}", sections.join(", "));
            }
            None => println!("Not signed in."),
        },
        Commands::Stats => {
            let stats = client.stats().await?;
            println!("Total members:    {}", stats.total_members);
            println!("Active members:   {}", stats.active_members);
            println!("Trainers:         {}", stats.total_trainers);
            println!("Est. revenue:     {:.2}", stats.estimated_revenue);
            println!("Check-ins today:  {}", stats.today_attendance);
            println!();
            for point in client.attendance_chart().await? {
                println!(
                    "{}  {:>3} {}",
                    point.date.format("%a %d"),
                    point.count,
                    "#".repeat(point.count.min(60) as usize).color(Color::SpringGreen4)
                );
            }
        }
        Commands::Members { search, status } => {
            let view = ListView::new(MemberDirectory(client.clone()), ServerQuery::new(config.page_size));
            load(&view, "members").await?;
            view.set_search(search);
            view.set_status(status);

            for member in view.visible() {
                println!(
                    "{:>5}  {:<24} {:<28} {:<10} {:<12} {}",
                    member.id,
                    member.name,
                    member.email,
                    badge(member.membership_status.label()),
                    member.plan_label(),
                    member.sub_end_label()
                );
            }
        }
        Commands::Users { role, search } => {
            let view = ListView::new(
                StaffDirectory(client.clone()),
                ServerQuery::new(config.page_size).with_role(role),
            );
            load(&view, "users").await?;
            view.set_search(search);

            for user in view.visible() {
                println!(
                    "{:>5}  {:<24} {:<28} {:<8} {}",
                    user.id,
                    user.name,
                    user.email,
                    user.role,
                    badge(user.status().label())
                );
            }
        }
        Commands::Attendance {
            page,
            from,
            to,
            search,
        } => {
            let view = ListView::new(
                AttendanceHistory(client.clone()),
                ServerQuery::new(config.page_size).with_date_range(DateRange::new(from, to)),
            );
            if view.set_page(page).await == Refresh::Failed {
                return Err("Failed to load attendance.".into());
            }
            view.set_search(search);

            for log in view.visible() {
                println!(
                    "{}  {:<24} {:<10} {}",
                    log.scan_time.format("%Y-%m-%d %H:%M"),
                    log.attendee_name(),
                    badge(log.trainer.membership_status.label()),
                    log.scanned_by_label()
                );
            }
            if let Some(pagination) = view.pagination() {
                println!("{} ({} records)", pagination.label(), pagination.total);
            }
        }
        Commands::Packages => {
            let view = ListView::new(PackageCatalog(client.clone()), ServerQuery::new(config.page_size));
            load(&view, "packages").await?;

            for package in view.items() {
                println!(
                    "{:>5}  {:<24} {:>4} days  {:>10.2}",
                    package.id, package.name, package.duration_days, package.price
                );
            }
        }
        Commands::Subscribe { member, package } => {
            let view = members_view(&client, config);
            let mut selection = SubscribeSelection::default();
            selection.begin(member);
            selection.choose_package(Some(package));
            report(selection.submit(&client, &view, &ui).await)?;
        }
        Commands::AddMember {
            name,
            email,
            password,
            package,
            picture,
        } => {
            let packages = client.packages().await?;
            let mut form = MemberForm::new();
            form.name = name;
            form.email = email;
            form.password = password;
            form.package_id = package;
            form.picture = picture.as_deref().map(Attachment::from_path).transpose()?;
            println!(
                "Estimated end date: {}",
                form.estimated_end_label(&packages, Utc::now().date_naive())
            );

            save(form, &client, &members_view(&client, config), &ui).await?;
        }
        Commands::EditMember {
            id,
            name,
            email,
            password,
            package,
            no_package,
        } => {
            let member = client
                .members()
                .await?
                .into_iter()
                .find(|m| m.id == id)
                .ok_or_else(|| format!("No member with id {id}."))?;

            let mut form = MemberForm::edit(&member);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(email) = email {
                form.email = email;
            }
            if let Some(password) = password {
                form.password = password;
            }
            if no_package {
                form.package_id = None;
            } else if package.is_some() {
                form.package_id = package;
            }

            save(form, &client, &members_view(&client, config), &ui).await?;
        }
        Commands::DeleteMember { id } => {
            let view = members_view(&client, config);
            report(DELETE_MEMBER.run(&view, &ui, || client.delete_member(id)).await)?;
        }
        Commands::ToggleMember { id } => {
            let view = members_view(&client, config);
            report(TOGGLE_MEMBER.run(&view, &ui, || client.toggle_member(id)).await)?;
        }
        Commands::AddUser {
            name,
            email,
            password,
            role,
        } => {
            let mut form = UserForm::new(role);
            form.name = name;
            form.email = email;
            form.password = password;

            save(form, &client, &users_view(&client, config, role), &ui).await?;
        }
        Commands::EditUser {
            id,
            role,
            name,
            email,
            password,
        } => {
            let user = client
                .users(role)
                .await?
                .into_iter()
                .find(|u| u.id == id)
                .ok_or_else(|| format!("No {role} with id {id}."))?;

            let mut form = UserForm::edit(&user)?;
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(email) = email {
                form.email = email;
            }
            if let Some(password) = password {
                form.password = password;
            }

            save(form, &client, &users_view(&client, config, role), &ui).await?;
        }
        Commands::DeleteUser { id, role } => {
            let view = users_view(&client, config, role);
            report(DELETE_USER.run(&view, &ui, || client.delete_user(id)).await)?;
        }
        Commands::ToggleUser { id, role } => {
            let view = users_view(&client, config, role);
            report(TOGGLE_USER.run(&view, &ui, || client.toggle_user(id)).await)?;
        }
        Commands::AddPackage { name, days, price } => {
            let mut form = PackageForm::new();
            form.name = name;
            form.duration_days = days;
            form.price = price;

            save(form, &client, &packages_view(&client, config), &ui).await?;
        }
        Commands::EditPackage {
            id,
            name,
            days,
            price,
        } => {
            let package = client
                .packages()
                .await?
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| format!("No package with id {id}."))?;

            let mut form = PackageForm::edit(&package);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(days) = days {
                form.duration_days = days;
            }
            if let Some(price) = price {
                form.price = price;
            }

            save(form, &client, &packages_view(&client, config), &ui).await?;
        }
        Commands::DeletePackage { id } => {
            let view = packages_view(&client, config);
            report(DELETE_PACKAGE.run(&view, &ui, || client.delete_package(id)).await)?;
        }
    }

    Ok(())
}

fn members_view(client: &Client, config: &Config) -> ListView<MemberDirectory> {
    ListView::new(MemberDirectory(client.clone()), ServerQuery::new(config.page_size))
}

fn users_view(client: &Client, config: &Config, role: StaffRole) -> ListView<StaffDirectory> {
    ListView::new(
        StaffDirectory(client.clone()),
        ServerQuery::new(config.page_size).with_role(role),
    )
}

fn packages_view(client: &Client, config: &Config) -> ListView<PackageCatalog> {
    ListView::new(PackageCatalog(client.clone()), ServerQuery::new(config.page_size))
}

async fn load<S: PageSource>(view: &ListView<S>, what: &str) -> CliResult {
    match view.refresh().await {
        Refresh::Failed => Err(format!("Failed to load {what}.").into()),
        _ => Ok(()),
    }
}

async fn save<F, S>(form: F, client: &Client, view: &ListView<S>, ui: &Terminal) -> CliResult
where
    F: FormSubmit,
    S: PageSource,
{
    let mut modal = Modal::default();
    modal.open(form);
    report(modal.save(client, view, ui).await)
}

fn report(outcome: MutationOutcome) -> CliResult {
    match outcome {
        MutationOutcome::Completed(_) => {
            println!("{} Done.", "[OK]".color(Color::SpringGreen4));
            Ok(())
        }
        MutationOutcome::Cancelled => {
            println!("Cancelled.");
            Ok(())
        }
        MutationOutcome::Incomplete => Err("Nothing to submit.".into()),
        // never passed to notify
        MutationOutcome::Failed(err @ GymError::Validation(_)) => Err(err.into()),
        MutationOutcome::Failed(_) => Err(Box::new(AlreadyReported)),
    }
}

/// A failure the user has already been notified about.
#[derive(Debug)]
struct AlreadyReported;

impl fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("action failed")
    }
}

impl Error for AlreadyReported {}

fn badge(label: &'static str) -> String {
    match label {
        "ACTIVE" => label.color(Color::SpringGreen4).to_string(),
        "INACTIVE" => label.color(Color::Red).to_string(),
        _ => label.color(Color::Yellow).to_string(),
    }
}
