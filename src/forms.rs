//! Create/edit forms for members, users and packages.
//!
//! A form opened without a record is in create mode: every field is
//! required, including the password. A form opened on an existing record is
//! in edit mode: fields start from the record and a blank password means
//! "leave it unchanged", so it is not sent at all.

use std::path::Path;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::multipart::{Form, Part};

use crate::actions::{Interaction, Mutation, MutationKind, MutationOutcome};
use crate::errors::{GymError, GymResult};
use crate::listing::{ListView, PageSource};
use crate::structs::client::Client;
use crate::structs::user::{StaffRole, User};
use crate::structs::{
    Member, MemberId, MemberUpdate, NewUser, Package, PackageId, PackageInput, UserId, UserUpdate,
};

/// Description the dashboard attaches to every package it saves.
pub const PACKAGE_DESCRIPTION: &str = "Web";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode<Id> {
    Create,
    Edit(Id),
}

impl<Id> FormMode<Id> {
    pub fn is_edit(&self) -> bool {
        matches!(self, FormMode::Edit(_))
    }
}

/// A picture picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Attachment {
    pub fn from_path(path: &Path) -> GymResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GymError::Validation(format!("`{}` is not a file", path.display())))?
            .to_string();

        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "png" => Some("image/png"),
                "jpg" | "jpeg" => Some("image/jpeg"),
                "gif" => Some("image/gif"),
                "webp" => Some("image/webp"),
                _ => None,
            })
            .map(str::to_string);

        Ok(Self {
            file_name,
            bytes: std::fs::read(path).map_err(|err| {
                GymError::Validation(format!("Cannot read {}: {err}", path.display()))
            })?,
            mime,
        })
    }
}

fn require(value: &str, field: &str) -> GymResult<()> {
    if value.trim().is_empty() {
        return Err(GymError::Validation(format!("{field} is required.")));
    }
    Ok(())
}

fn require_email(value: &str) -> GymResult<()> {
    require(value, "Email")?;
    if !value.contains('@') {
        return Err(GymError::Validation(format!(
            "`{value}` is not a valid email address."
        )));
    }
    Ok(())
}

/// `None` for a blank password so it is left out of edit requests.
fn optional_password(password: &str) -> Option<String> {
    (!password.is_empty()).then(|| password.to_string())
}

/// A form a [`Modal`] can validate and submit.
#[async_trait]
pub trait FormSubmit: Send + Sync {
    fn mutation(&self) -> Mutation;

    fn validate(&self) -> GymResult<()>;

    async fn submit(&self, client: &Client) -> GymResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberForm {
    mode: FormMode<MemberId>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub package_id: Option<PackageId>,
    /// Only sent when creating.
    pub picture: Option<Attachment>,
}

impl Default for MemberForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberForm {
    pub fn new() -> Self {
        Self {
            mode: FormMode::Create,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            package_id: None,
            picture: None,
        }
    }

    pub fn edit(member: &Member) -> Self {
        Self {
            mode: FormMode::Edit(member.id),
            name: member.name.clone(),
            email: member.email.clone(),
            password: String::new(),
            package_id: member.package.as_ref().and_then(|p| p.id),
            picture: None,
        }
    }

    pub fn mode(&self) -> FormMode<MemberId> {
        self.mode
    }

    /// Today plus the selected package's duration. Advisory only, never sent.
    pub fn estimated_end_date(&self, packages: &[Package], today: NaiveDate) -> Option<NaiveDate> {
        let package = packages.iter().find(|p| Some(p.id) == self.package_id)?;
        today.checked_add_days(Days::new(u64::from(package.duration_days)))
    }

    /// [`estimated_end_date`](Self::estimated_end_date) for display, `-` when
    /// no package is selected.
    pub fn estimated_end_label(&self, packages: &[Package], today: NaiveDate) -> String {
        self.estimated_end_date(packages, today)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    /// Multipart body for `/auth/register`. `package_id` and the picture are
    /// only present when chosen.
    pub fn multipart(&self) -> GymResult<Form> {
        let mut form = Form::new()
            .text("name", self.name.clone())
            .text("email", self.email.clone())
            .text("password", self.password.clone());

        if let Some(package_id) = self.package_id {
            form = form.text("package_id", package_id.to_string());
        }

        if let Some(picture) = &self.picture {
            let mut part = Part::bytes(picture.bytes.clone()).file_name(picture.file_name.clone());
            if let Some(mime) = &picture.mime {
                part = part.mime_str(mime)?;
            }
            form = form.part("profile_picture", part);
        }

        Ok(form)
    }

    pub fn update_body(&self) -> MemberUpdate {
        MemberUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
            package_id: self.package_id,
            password: optional_password(&self.password),
        }
    }
}

#[async_trait]
impl FormSubmit for MemberForm {
    fn mutation(&self) -> Mutation {
        match self.mode {
            FormMode::Create => Mutation::new(MutationKind::Create, "member"),
            FormMode::Edit(_) => Mutation::new(MutationKind::Update, "member"),
        }
    }

    fn validate(&self) -> GymResult<()> {
        require(&self.name, "Full name")?;
        require_email(&self.email)?;
        if !self.mode.is_edit() {
            require(&self.password, "Password")?;
        }
        Ok(())
    }

    async fn submit(&self, client: &Client) -> GymResult<()> {
        match self.mode {
            FormMode::Create => client.register_member(self.multipart()?).await,
            FormMode::Edit(id) => client.update_member(id, &self.update_body()).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    mode: FormMode<UserId>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: StaffRole,
}

impl UserForm {
    pub fn new(role: StaffRole) -> Self {
        Self {
            mode: FormMode::Create,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            role,
        }
    }

    /// Fails for accounts that are neither staff nor trainer.
    pub fn edit(user: &User) -> GymResult<Self> {
        Ok(Self {
            mode: FormMode::Edit(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            password: String::new(),
            role: StaffRole::try_from(user.role)?,
        })
    }

    pub fn mode(&self) -> FormMode<UserId> {
        self.mode
    }

    pub fn create_body(&self) -> NewUser {
        NewUser {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            role: self.role,
        }
    }

    pub fn update_body(&self) -> UserUpdate {
        UserUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            password: optional_password(&self.password),
        }
    }
}

#[async_trait]
impl FormSubmit for UserForm {
    fn mutation(&self) -> Mutation {
        match self.mode {
            FormMode::Create => Mutation::new(MutationKind::Create, "user"),
            FormMode::Edit(_) => Mutation::new(MutationKind::Update, "user"),
        }
    }

    fn validate(&self) -> GymResult<()> {
        require(&self.name, "Full name")?;
        require_email(&self.email)?;
        if !self.mode.is_edit() {
            require(&self.password, "Password")?;
        }
        Ok(())
    }

    async fn submit(&self, client: &Client) -> GymResult<()> {
        match self.mode {
            FormMode::Create => client.create_user(&self.create_body()).await,
            FormMode::Edit(id) => client.update_user(id, &self.update_body()).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageForm {
    mode: FormMode<PackageId>,
    pub name: String,
    pub duration_days: u32,
    pub price: f64,
}

impl Default for PackageForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageForm {
    pub fn new() -> Self {
        Self {
            mode: FormMode::Create,
            name: String::new(),
            duration_days: 30,
            price: 0.0,
        }
    }

    pub fn edit(package: &Package) -> Self {
        Self {
            mode: FormMode::Edit(package.id),
            name: package.name.clone(),
            duration_days: package.duration_days,
            price: package.price,
        }
    }

    pub fn mode(&self) -> FormMode<PackageId> {
        self.mode
    }

    pub fn body(&self) -> PackageInput {
        PackageInput {
            name: self.name.clone(),
            duration_days: self.duration_days,
            price: self.price,
            description: PACKAGE_DESCRIPTION.to_string(),
        }
    }
}

#[async_trait]
impl FormSubmit for PackageForm {
    fn mutation(&self) -> Mutation {
        match self.mode {
            FormMode::Create => Mutation::new(MutationKind::Create, "package"),
            FormMode::Edit(_) => Mutation::new(MutationKind::Update, "package"),
        }
    }

    fn validate(&self) -> GymResult<()> {
        require(&self.name, "Plan name")?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(GymError::Validation("Price must be zero or more.".to_string()));
        }
        Ok(())
    }

    async fn submit(&self, client: &Client) -> GymResult<()> {
        match self.mode {
            FormMode::Create => client.create_package(&self.body()).await,
            FormMode::Edit(id) => client.update_package(id, &self.body()).await,
        }
    }
}

/// An open or closed form dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Modal<F> {
    form: Option<F>,
}

impl<F> Default for Modal<F> {
    fn default() -> Self {
        Self { form: None }
    }
}

impl<F: FormSubmit> Modal<F> {
    pub fn open(&mut self, form: F) {
        self.form = Some(form);
    }

    pub fn close(&mut self) {
        self.form = None;
    }

    pub fn is_open(&self) -> bool {
        self.form.is_some()
    }

    pub fn form(&self) -> Option<&F> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut F> {
        self.form.as_mut()
    }

    /// Validates and submits the open form. On success the dialog closes and
    /// `view` is fetched again; otherwise the form stays open as it was.
    pub async fn save<S: PageSource>(
        &mut self,
        client: &Client,
        view: &ListView<S>,
        ui: &dyn Interaction,
    ) -> MutationOutcome {
        let Some(form) = &self.form else {
            return MutationOutcome::Incomplete;
        };

        if let Err(err) = form.validate() {
            return MutationOutcome::Failed(err);
        }

        let outcome = form.mutation().run(view, ui, || form.submit(client)).await;
        if outcome.is_completed() {
            self.close();
        }
        outcome
    }
}
