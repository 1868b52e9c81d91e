//! Hedgebox - a simulated online drive SaaS.
//!
//! Most users are personal users from the US, but businesses bring the
//! revenue: one cluster in five is a company whose kernel signs the whole
//! team up and invites coworkers. A new signup page is being A/B tested in
//! the second half of the simulated history, and Internet Explorer users
//! like the product less.
//!
//! Account state (plan, storage, team size) lives in the shared group store
//! under the `account` group type, so every member of a company sees the
//! same account.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use matrix_core::{Behavior, Bounded, ClusterProfile, Effect, Person, Properties, SimContext, SimError, TimeWindow};
use matrix_env::{ContentProvider, SimRandom};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

// URLs

pub const SITE_URL: &str = "https://hedgebox.net";
pub const URL_HOME: &str = "https://hedgebox.net/";
pub const URL_MARIUS_TECH_TIPS: &str = "https://hedgebox.net/mariustechtips/";
pub const URL_PRICING: &str = "https://hedgebox.net/pricing/";
pub const URL_PRODUCT: &str = "https://hedgebox.net/product/";
pub const URL_SIGNUP: &str = "https://hedgebox.net/signup/";
pub const URL_LOGIN: &str = "https://hedgebox.net/login/";
pub const URL_FILES: &str = "https://hedgebox.net/files/";
pub const URL_ACCOUNT_SETTINGS: &str = "https://hedgebox.net/account/settings/";
pub const URL_ACCOUNT_BILLING: &str = "https://hedgebox.net/account/billing/";
pub const URL_ACCOUNT_TEAM: &str = "https://hedgebox.net/account/team/";

pub fn url_invite(invite_id: &str) -> String {
    format!("{}/invite/{}/", SITE_URL, invite_id)
}

pub fn url_file(file_id: &str) -> String {
    format!("{}/files/{}/", SITE_URL, file_id)
}

// Event taxonomy

pub const EVENT_SIGNED_UP: &str = "signed_up";
pub const EVENT_LOGGED_IN: &str = "logged_in";
pub const EVENT_UPLOADED_FILE: &str = "uploaded_file";
pub const EVENT_DOWNLOADED_FILE: &str = "downloaded_file";
pub const EVENT_DELETED_FILE: &str = "deleted_file";
pub const EVENT_SHARED_FILE_LINK: &str = "shared_file_link";
pub const EVENT_UPGRADED_PLAN: &str = "upgraded_plan";
pub const EVENT_DOWNGRADED_PLAN: &str = "downgraded_plan";
pub const EVENT_INVITED_TEAM_MEMBER: &str = "invited_team_member";
pub const EVENT_REMOVED_TEAM_MEMBER: &str = "removed_team_member";
pub const EVENT_PAID_BILL: &str = "paid_bill";

/// Group type of accounts. Properties: name, used_mb, plan, owner, members, team_size.
pub const GROUP_TYPE_ACCOUNT: &str = "account";

// Signup page experiment

pub const NEW_SIGNUP_PAGE_FLAG_KEY: &str = "signup-page-4.0";
pub const PROPERTY_NEW_SIGNUP_PAGE_FLAG: &str = "$feature/signup-page-4.0";
pub const NEW_SIGNUP_PAGE_FLAG_ROLLOUT: f64 = 0.5;
pub const SIGNUP_SUCCESS_RATE_TEST: f64 = 0.5794;
pub const SIGNUP_SUCCESS_RATE_CONTROL: f64 = 0.4887;

/// Business-only flag, released shortly before `now`.
pub const FILE_PREVIEWS_FLAG_KEY: &str = "file-previews";
pub const PROPERTY_FILE_PREVIEWS_FLAG: &str = "$feature/file-previews";

/// Share of clusters that are companies rather than social circles.
pub const COMPANY_CLUSTERS_PROPORTION: f64 = 0.2;

const US_SHARE: f64 = 0.9132;
const INTERNET_EXPLORER: &str = "Internet Explorer";
const REFERRER_GOOGLE: &str = "https://www.google.com/";
const REFERRER_YOUTUBE: &str = "https://www.youtube.com/c/MariusTechTips";

// Person state

const ATTR_NEED: &str = "need";
const ATTR_SATISFACTION: &str = "satisfaction";
const ATTR_AFFINITY: &str = "affinity";

const MEMORY_PERSON_ID: &str = "person_id";
const MEMORY_ACCOUNT_ID: &str = "account_id";
const MEMORY_REFERRER: &str = "referrer";
const MEMORY_FILES: &str = "files";
const MEMORY_RECEIVED_INVITE_ID: &str = "received_invite_id";
const MEMORY_RECEIVED_FILE_ID: &str = "received_file_id";

const TRAIT_COMPANY_NAME: &str = "company_name";

/// Hedgebox pricing plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeboxPlan {
    PersonalFree,
    PersonalPro,
    BusinessStandard,
    BusinessEnterprise,
}

impl HedgeboxPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            HedgeboxPlan::PersonalFree => "personal/free",
            HedgeboxPlan::PersonalPro => "personal/pro",
            HedgeboxPlan::BusinessStandard => "business/standard",
            HedgeboxPlan::BusinessEnterprise => "business/enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "personal/free" => Some(HedgeboxPlan::PersonalFree),
            "personal/pro" => Some(HedgeboxPlan::PersonalPro),
            "business/standard" => Some(HedgeboxPlan::BusinessStandard),
            "business/enterprise" => Some(HedgeboxPlan::BusinessEnterprise),
            _ => None,
        }
    }

    pub fn is_business(&self) -> bool {
        matches!(self, HedgeboxPlan::BusinessStandard | HedgeboxPlan::BusinessEnterprise)
    }

    pub fn higher_plan(&self) -> Option<Self> {
        match self {
            HedgeboxPlan::PersonalFree => Some(HedgeboxPlan::PersonalPro),
            HedgeboxPlan::BusinessStandard => Some(HedgeboxPlan::BusinessEnterprise),
            _ => None,
        }
    }

    pub fn lower_plan(&self) -> Option<Self> {
        match self {
            HedgeboxPlan::PersonalPro => Some(HedgeboxPlan::PersonalFree),
            HedgeboxPlan::BusinessEnterprise => Some(HedgeboxPlan::BusinessStandard),
            _ => None,
        }
    }

    /// Storage allowance in megabytes.
    pub fn allowed_mb(&self) -> u64 {
        match self {
            HedgeboxPlan::PersonalFree => 10_000,
            HedgeboxPlan::PersonalPro => 1_000_000,
            HedgeboxPlan::BusinessStandard => 5_000_000,
            HedgeboxPlan::BusinessEnterprise => 100_000_000,
        }
    }

    /// Monthly bill in USD; business plans are billed per seat.
    pub fn monthly_bill_usd(&self, team_size: u64) -> f64 {
        match self {
            HedgeboxPlan::PersonalFree => 0.0,
            HedgeboxPlan::PersonalPro => 10.0,
            HedgeboxPlan::BusinessStandard => 10.0 * team_size as f64,
            HedgeboxPlan::BusinessEnterprise => 20.0 * team_size as f64,
        }
    }
}

impl fmt::Display for HedgeboxPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a person has in mind for the session about to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeboxIntent {
    ConsiderProduct,
    CheckMariusTechTipsLink,
    UploadFile,
    DeleteFile,
    SeeOwnFile,
    ShareFile,
    SeeSharedFile,
    InviteTeamMember,
    RemoveTeamMember,
    JoinFromInvite,
    UpgradePlan,
    DowngradePlan,
}

impl HedgeboxIntent {
    /// Intents that happen inside the product and need a logged-in client.
    fn needs_login(&self) -> bool {
        !matches!(
            self,
            HedgeboxIntent::ConsiderProduct
                | HedgeboxIntent::CheckMariusTechTipsLink
                | HedgeboxIntent::SeeSharedFile
                | HedgeboxIntent::JoinFromInvite
        )
    }
}

/// Where a prospect first heard of Hedgebox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Referrer {
    WordOfMouth,
    Coworker,
    Google,
    MariusTechTips,
}

impl Referrer {
    fn url(&self) -> &'static str {
        match self {
            Referrer::WordOfMouth | Referrer::Coworker => "$direct",
            Referrer::Google => REFERRER_GOOGLE,
            Referrer::MariusTechTips => REFERRER_YOUTUBE,
        }
    }
}

/// A file in a person's drive, kept in policy memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HedgeboxFile {
    id: String,
    file_type: String,
    size_b: u64,
}

impl HedgeboxFile {
    fn properties(&self) -> Properties {
        object(json!({ "file_type": self.file_type, "file_size_b": self.size_b }))
    }
}

/// The Hedgebox behavior policy.
#[derive(Debug, Clone)]
pub struct HedgeboxBehavior {
    experiment_start: DateTime<Utc>,
    experiment_end: DateTime<Utc>,
    file_previews_release: DateTime<Utc>,
}

impl HedgeboxBehavior {
    /// The signup page experiment starts halfway through the past and ends shortly before `now`.
    pub fn new(window: TimeWindow) -> Self {
        let experiment_end = window.now - (Duration::days(2) + Duration::hours(3) + Duration::seconds(43));
        let experiment_start = window.start + (experiment_end - window.start) / 2;
        Self {
            experiment_start,
            experiment_end,
            file_previews_release: window.now - Duration::days(15),
        }
    }

    pub fn experiment_start(&self) -> DateTime<Utc> {
        self.experiment_start
    }

    pub fn experiment_end(&self) -> DateTime<Utc> {
        self.experiment_end
    }

    pub fn file_previews_release(&self) -> DateTime<Utc> {
        self.file_previews_release
    }

    /// File previews are on for business users once released.
    fn update_feature_flags(&self, person: &mut Person, ctx: &SimContext<'_>) {
        if is_company(ctx) && person.simulation_time() >= self.file_previews_release {
            person.set_feature_flag(FILE_PREVIEWS_FLAG_KEY, true);
        } else {
            person.clear_feature_flag(FILE_PREVIEWS_FLAG_KEY);
        }
    }

    /// Enrolls the person in the experiment while it runs, and drops the
    /// variant once the new page has shipped to everyone.
    fn update_signup_experiment(&self, person: &mut Person) -> Result<(), SimError> {
        let t = person.simulation_time();
        let enrolled = person.client().super_properties().contains_key(PROPERTY_NEW_SIGNUP_PAGE_FLAG);
        if !enrolled && t >= self.experiment_start && t < self.experiment_end {
            let variant = if person.random().chance(NEW_SIGNUP_PAGE_FLAG_ROLLOUT) {
                "test"
            } else {
                "control"
            };
            person.register(object(json!({ PROPERTY_NEW_SIGNUP_PAGE_FLAG: variant })));
        } else if enrolled && t >= self.experiment_end {
            person.unregister(&[PROPERTY_NEW_SIGNUP_PAGE_FLAG])?;
        }
        Ok(())
    }

    fn is_on_new_signup_page(&self, person: &Person) -> bool {
        person.simulation_time() >= self.experiment_end
            || person
                .client()
                .super_properties()
                .get(PROPERTY_NEW_SIGNUP_PAGE_FLAG)
                .and_then(Value::as_str)
                == Some("test")
    }

    // Page visits

    fn visit_home(&self, person: &mut Person, referrer: Option<&str>) -> Result<(), SimError> {
        person.capture_pageview(URL_HOME, None, referrer);
        let viewing = 1.8 + person.random().beta(1.5, 3.0)? * 300.0;
        person.advance_timer(viewing);
        let liking = (person.random().beta(1.6, 1.2)? - 0.5) * 0.1;
        person.move_attribute(ATTR_SATISFACTION, liking)
    }

    fn visit_marius_tech_tips(&self, person: &mut Person) -> Result<(), SimError> {
        person.capture_pageview(URL_MARIUS_TECH_TIPS, None, Some(REFERRER_YOUTUBE));
        let viewing = 1.2 + person.random().beta(1.5, 2.0)? * 150.0;
        person.advance_timer(viewing);
        // The viewer may or may not be in the target audience
        let liking = (person.random().beta(1.6, 1.2)? - 0.5) * 0.4;
        person.move_attribute(ATTR_SATISFACTION, liking)
    }

    fn visit_page(&self, person: &mut Person, url: &str, max_secs: f64) -> Result<(), SimError> {
        person.capture_pageview(url, None, None);
        let viewing = 1.2 + person.random().beta(1.5, 2.0)? * max_secs;
        person.advance_timer(viewing);
        Ok(())
    }

    fn visit_sign_up(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<bool, SimError> {
        if !can_sign_up(person, ctx) {
            return Err(SimError::policy("only the kernel can sign a company up"));
        }
        person.capture_pageview(URL_SIGNUP, None, None);

        if has_signed_up(person) {
            let delay = 5.0 + person.random().beta(2.0, 1.3)? * 19.0;
            person.advance_timer(delay);
            return self.visit_login(person, ctx);
        }

        let new_page = self.is_on_new_signup_page(person);
        let success_rate = if new_page {
            SIGNUP_SUCCESS_RATE_TEST
        } else {
            SIGNUP_SUCCESS_RATE_CONTROL
        };
        let success = person.random().chance(success_rate);
        // Filling out forms; faster on the new page
        let form_secs = match (success, new_page) {
            (false, _) => 60.0,
            (true, true) => 120.0,
            (true, false) => 170.0,
        };
        let filling = 9.0 + person.random().beta(1.2, 2.0)? * form_secs;
        person.advance_timer(filling);

        if !success {
            let frustration = (person.random().beta(1.0, 3.0)? - 0.75) * 0.5;
            person.move_attribute(ATTR_SATISFACTION, frustration)?;
            return Ok(false);
        }

        let account_id = {
            let millis = person.simulation_time().timestamp_millis();
            person.random().uuidt(millis).to_string()
        };
        person.capture(EVENT_SIGNED_UP, Some(object(json!({ "from_invite": false }))));
        let pause = person.random().uniform(0.1, 0.2);
        person.advance_timer(pause);
        self.identify_with_profile(person)?;

        let company_name = ctx.cluster.trait_str(TRAIT_COMPANY_NAME).map(str::to_string);
        let plan = if company_name.is_some() {
            HedgeboxPlan::BusinessStandard
        } else {
            HedgeboxPlan::PersonalFree
        };
        let name = company_name.unwrap_or_else(|| person.name().to_string());
        let person_id = person_id(person)?;
        person.remember(MEMORY_ACCOUNT_ID, account_id.clone());
        person.group(
            ctx,
            GROUP_TYPE_ACCOUNT,
            &account_id,
            Some(object(json!({
                "name": name,
                "used_mb": 0.0,
                "plan": plan.as_str(),
                "owner": person_id,
                "members": [person_id],
                "team_size": 1,
            }))),
        );
        debug!(person = %person.id(), account = %account_id, %plan, "Signed up");

        let delight = (person.random().beta(1.5, 1.2)? - 0.5) * 0.2;
        person.move_attribute(ATTR_SATISFACTION, delight)?;
        Ok(true)
    }

    fn visit_login(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<bool, SimError> {
        person.capture_pageview(URL_LOGIN, None, None);

        if !has_signed_up(person) {
            let delay = 3.0 + person.random().beta(1.4, 1.2)? * 14.0;
            person.advance_timer(delay);
            if can_sign_up(person, ctx) {
                return self.visit_sign_up(person, ctx);
            }
            return Ok(false);
        }

        // There's always a tiny chance the user gives up
        let success = person.random().chance(0.95);
        let typing = 2.0 + person.random().beta(1.2, 1.2)? * if success { 29.0 } else { 17.0 };
        person.advance_timer(typing);

        if success {
            person.capture(EVENT_LOGGED_IN, None);
            let pause = person.random().uniform(0.1, 0.2);
            person.advance_timer(pause);
            let person_id = person_id(person)?;
            person.identify(Some(&person_id), Properties::new());
        }
        Ok(success)
    }

    fn identify_with_profile(&self, person: &mut Person) -> Result<(), SimError> {
        let person_id = person_id(person)?;
        let profile = object(json!({ "email": person.email(), "name": person.name() }));
        person.identify(Some(&person_id), profile);
        Ok(())
    }

    /// Picks where the prospect comes from, once.
    fn first_touch_referrer(&self, person: &mut Person, ctx: &SimContext<'_>) -> Result<Option<&'static str>, SimError> {
        if person.memory(MEMORY_REFERRER).is_some() {
            return Ok(None);
        }
        let mut sources = vec![
            (Referrer::WordOfMouth, 5.0),
            (Referrer::Google, 4.0),
            (Referrer::MariusTechTips, 2.0),
        ];
        if is_company(ctx) {
            sources.push((Referrer::Coworker, 6.0));
        }
        let referrer = *person.random().weighted_choice(&sources)?;
        person.remember(MEMORY_REFERRER, format!("{:?}", referrer));
        Ok(Some(referrer.url()))
    }

    // Intent flows

    fn consider_product(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let referrer = self.first_touch_referrer(person, ctx)?;
        self.visit_home(person, referrer)?;

        let need = attribute(person, ATTR_NEED)?;
        let affinity = attribute(person, ATTR_AFFINITY)?;
        if person.random().chance(0.6) {
            self.visit_page(person, URL_PRODUCT, 200.0)?;
        }
        if person.random().chance(0.4 + need * 0.3) {
            self.visit_page(person, URL_PRICING, 200.0)?;
        }

        if !can_sign_up(person, ctx) {
            // Coworkers wait for the company to adopt the product
            return person.move_attribute(ATTR_NEED, -0.02);
        }
        let satisfaction = attribute(person, ATTR_SATISFACTION)?;
        if satisfaction > -0.5 && person.random().chance(affinity * (0.4 + need * 0.6)) {
            self.visit_sign_up(person, ctx)?;
        }
        Ok(())
    }

    fn check_marius_tech_tips_link(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        if person.memory(MEMORY_REFERRER).is_none() {
            person.remember(MEMORY_REFERRER, format!("{:?}", Referrer::MariusTechTips));
        }
        self.visit_marius_tech_tips(person)?;
        let satisfaction = attribute(person, ATTR_SATISFACTION)?;
        let affinity = attribute(person, ATTR_AFFINITY)?;
        if can_sign_up(person, ctx) && satisfaction > 0.0 && person.random().chance(affinity * 0.5) {
            self.visit_sign_up(person, ctx)?;
        }
        Ok(())
    }

    fn upload_file(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let account_id = require_account(person)?;
        let plan = account_plan(ctx, &account_id);
        let mut used_mb = account_f64(ctx, &account_id, "used_mb");
        let mut files = files(person)?;

        self.visit_page(person, URL_FILES, 20.0)?;
        let picking = person.random().beta(2.5, 1.1)? * 95.0;
        person.advance_timer(picking);

        let count = person.random().int_range(1, 13);
        for _ in 0..count {
            let size_b = person.random().int_range(10_000, 80_000_000) as u64;
            let size_mb = size_b as f64 / 1_000_000.0;
            if used_mb + size_mb > plan.allowed_mb() as f64 {
                // Out of storage
                person.move_attribute(ATTR_SATISFACTION, -0.1)?;
                break;
            }
            let file = HedgeboxFile {
                id: person.random().token(16, false),
                file_type: ctx.providers.file_extension(person.random())?,
                size_b,
            };
            person.capture(EVENT_UPLOADED_FILE, Some(file.properties()));
            let transfer = person.random().uniform(0.5, 8.0);
            person.advance_timer(transfer);
            used_mb += size_mb;
            files.push(file);
        }
        store_files(person, &files)?;
        ctx.update_group(GROUP_TYPE_ACCOUNT, &account_id, &object(json!({ "used_mb": used_mb })));

        let experience = person.random().uniform(-0.19, 0.2);
        person.move_attribute(ATTR_SATISFACTION, experience)?;
        if attribute(person, ATTR_SATISFACTION)? > 0.9 {
            // Delighted users make their friends want a drive too
            person.affect_neighbors(Effect::shift(ATTR_NEED, 0.05));
        }
        Ok(())
    }

    fn delete_file(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let account_id = require_account(person)?;
        let mut files = files(person)?;
        let index = pick_index(person, files.len(), HedgeboxIntent::DeleteFile)?;
        let file = files.remove(index);

        self.visit_page(person, &url_file(&file.id), 30.0)?;
        person.capture(EVENT_DELETED_FILE, Some(file.properties()));
        store_files(person, &files)?;

        let used_mb = (account_f64(ctx, &account_id, "used_mb") - file.size_b as f64 / 1_000_000.0).max(0.0);
        ctx.update_group(GROUP_TYPE_ACCOUNT, &account_id, &object(json!({ "used_mb": used_mb })));
        Ok(())
    }

    fn see_own_file(&self, person: &mut Person) -> Result<(), SimError> {
        let files = files(person)?;
        let index = pick_index(person, files.len(), HedgeboxIntent::SeeOwnFile)?;
        let file = &files[index];

        self.visit_page(person, &url_file(&file.id), 60.0)?;
        person.capture(EVENT_DOWNLOADED_FILE, Some(file.properties()));
        let experience = person.random().uniform(-0.05, 0.1);
        person.move_attribute(ATTR_SATISFACTION, experience)
    }

    fn share_file(&self, person: &mut Person) -> Result<(), SimError> {
        let files = files(person)?;
        let index = pick_index(person, files.len(), HedgeboxIntent::ShareFile)?;
        let file = &files[index];

        self.visit_page(person, &url_file(&file.id), 30.0)?;
        person.capture(EVENT_SHARED_FILE_LINK, Some(file.properties()));
        person.affect_neighbors(Effect::remember(MEMORY_RECEIVED_FILE_ID, file.id.clone()));
        Ok(())
    }

    fn see_shared_file(&self, person: &mut Person) -> Result<(), SimError> {
        let file_id = match person.forget(MEMORY_RECEIVED_FILE_ID) {
            Some(Value::String(file_id)) => file_id,
            _ => return Err(SimError::unhandled_intent(HedgeboxIntent::SeeSharedFile)),
        };
        person.capture_pageview(&url_file(&file_id), None, Some("$direct"));
        let viewing = 1.2 + person.random().beta(1.2, 1.6)? * 60.0;
        person.advance_timer(viewing);

        if has_signed_up(person) {
            person.capture(EVENT_DOWNLOADED_FILE, Some(object(json!({ "from_shared_link": true }))));
        } else {
            // Seeing the product in action makes a prospect more interested
            person.move_attribute(ATTR_NEED, 0.1)?;
            if person.memory(MEMORY_REFERRER).is_none() {
                person.remember(MEMORY_REFERRER, format!("{:?}", Referrer::WordOfMouth));
            }
        }
        Ok(())
    }

    fn invite_team_member(&self, person: &mut Person) -> Result<(), SimError> {
        let account_id = require_account(person)?;
        self.visit_page(person, URL_ACCOUNT_TEAM, 40.0)?;
        person.capture(EVENT_INVITED_TEAM_MEMBER, None);
        person.affect_neighbors(Effect::remember(MEMORY_RECEIVED_INVITE_ID, account_id));
        Ok(())
    }

    fn join_from_invite(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let account_id = match person.forget(MEMORY_RECEIVED_INVITE_ID) {
            Some(Value::String(account_id)) => account_id,
            _ => return Err(SimError::unhandled_intent(HedgeboxIntent::JoinFromInvite)),
        };
        person.capture_pageview(&url_invite(&account_id), None, Some("$direct"));
        if has_signed_up(person) {
            return Ok(());
        }

        let filling = 9.0 + person.random().beta(1.2, 2.0)? * 60.0;
        person.advance_timer(filling);
        person.capture(EVENT_SIGNED_UP, Some(object(json!({ "from_invite": true }))));
        let pause = person.random().uniform(0.1, 0.2);
        person.advance_timer(pause);
        self.identify_with_profile(person)?;

        let person_id = person_id(person)?;
        let mut members = account_members(ctx, &account_id);
        if !members.contains(&person_id) {
            members.push(person_id);
        }
        person.remember(MEMORY_ACCOUNT_ID, account_id.clone());
        person.group(ctx, GROUP_TYPE_ACCOUNT, &account_id, Some(members_update(&members)));
        let delight = (person.random().beta(1.5, 1.2)? - 0.5) * 0.2;
        person.move_attribute(ATTR_SATISFACTION, delight)
    }

    fn remove_team_member(&self, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let account_id = require_account(person)?;
        let candidates = removable_members(ctx, &account_id, &person_id(person)?);
        let index = pick_index(person, candidates.len(), HedgeboxIntent::RemoveTeamMember)?;
        let removed = &candidates[index];

        self.visit_page(person, URL_ACCOUNT_TEAM, 40.0)?;
        person.capture(EVENT_REMOVED_TEAM_MEMBER, None);
        let members: Vec<String> = account_members(ctx, &account_id)
            .into_iter()
            .filter(|member| member != removed)
            .collect();
        person.group(ctx, GROUP_TYPE_ACCOUNT, &account_id, Some(members_update(&members)));
        debug!(person = %person.id(), account = %account_id, removed = %removed, "Removed team member");
        Ok(())
    }

    fn change_plan(&self, person: &mut Person, ctx: &mut SimContext<'_>, intent: HedgeboxIntent) -> Result<(), SimError> {
        let account_id = require_account(person)?;
        let previous = account_plan(ctx, &account_id);
        let (new_plan, event) = match intent {
            HedgeboxIntent::UpgradePlan => (previous.higher_plan(), EVENT_UPGRADED_PLAN),
            HedgeboxIntent::DowngradePlan => (previous.lower_plan(), EVENT_DOWNGRADED_PLAN),
            _ => (None, ""),
        };
        let Some(new_plan) = new_plan else {
            return Err(SimError::unhandled_intent(intent));
        };

        self.visit_page(person, URL_ACCOUNT_SETTINGS, 20.0)?;
        self.visit_page(person, URL_ACCOUNT_BILLING, 90.0)?;
        person.capture(
            event,
            Some(object(json!({
                "previous_plan": previous.as_str(),
                "new_plan": new_plan.as_str(),
            }))),
        );
        person.group(
            ctx,
            GROUP_TYPE_ACCOUNT,
            &account_id,
            Some(object(json!({ "plan": new_plan.as_str() }))),
        );

        let team_size = account_u64(ctx, &account_id, "team_size").max(1);
        let amount = new_plan.monthly_bill_usd(team_size);
        if amount > 0.0 {
            let used_mb = account_f64(ctx, &account_id, "used_mb");
            person.capture(
                EVENT_PAID_BILL,
                Some(object(json!({
                    "used_mb": used_mb,
                    "allowed_mb": new_plan.allowed_mb(),
                    "plan": new_plan.as_str(),
                    "amount": amount,
                }))),
            );
        }
        Ok(())
    }
}

impl Behavior for HedgeboxBehavior {
    type Intent = HedgeboxIntent;

    fn cluster_traits(&self, random: &mut SimRandom, providers: &dyn ContentProvider) -> Result<Properties, SimError> {
        let mut traits = Properties::new();
        if random.chance(COMPANY_CLUSTERS_PROPORTION) {
            traits.insert(TRAIT_COMPANY_NAME.to_string(), json!(providers.company(random)?));
        }
        Ok(traits)
    }

    fn country_code(&self, random: &mut SimRandom, providers: &dyn ContentProvider) -> Result<String, SimError> {
        if random.random() < US_SHARE {
            Ok("US".to_string())
        } else {
            Ok(providers.country_code(random)?)
        }
    }

    fn init_person(&self, person: &mut Person, _cluster: &ClusterProfile) -> Result<(), SimError> {
        let affinity = if person.client().device().browser != INTERNET_EXPLORER {
            person.random().beta(1.8, 1.2)?
        } else {
            person.random().beta(1.0, 1.4)?
        };
        // Kernels are the likeliest to need a drive
        let need = if person.is_kernel() {
            person.random().uniform(0.6, 1.0)
        } else {
            person.random().uniform(0.0, 0.2)
        };
        let person_id = person.random().token(16, false);

        person.declare_attribute(ATTR_AFFINITY, Bounded::unit(affinity));
        person.declare_attribute(ATTR_NEED, Bounded::unit(need));
        person.declare_attribute(ATTR_SATISFACTION, Bounded::signed_unit(0.0));
        person.remember(MEMORY_PERSON_ID, person_id);
        Ok(())
    }

    fn next_session_time(&self, person: &mut Person, ctx: &SimContext<'_>) -> Result<DateTime<Utc>, SimError> {
        let need = attribute(person, ATTR_NEED)?;
        let scale = if has_signed_up(person) { 36_000.0 } else { 172_800.0 };
        let company = is_company(ctx);
        let offset = person.timezone().offset();
        let mut t = person.simulation_time();
        loop {
            let gap = person.random().beta(2.5, 1.0 + need)? * scale + 24.0;
            t += Duration::milliseconds((gap * 1000.0) as i64);

            let local = t.with_timezone(&offset);
            let hour = local.hour();
            let workday = local.weekday().num_days_from_monday() < 5;
            let appropriateness = if hour < 5 || hour >= 23 {
                0.1
            } else if workday && (9..=17).contains(&hour) {
                // Business users work 9 to 5, personal users do the opposite
                if company {
                    1.0
                } else {
                    0.3
                }
            } else if company {
                0.2
            } else {
                1.0
            };
            if person.random().random() < appropriateness {
                return Ok(t);
            }
        }
    }

    fn session_intent(&self, person: &mut Person, ctx: &SimContext<'_>) -> Result<Option<HedgeboxIntent>, SimError> {
        if let Some(account_id) = account_id(person) {
            if !account_members(ctx, &account_id).contains(&person_id(person)?) {
                // Removed from the team since the last session
                person.forget(MEMORY_ACCOUNT_ID);
                person.forget(MEMORY_FILES);
                person.leave_group(GROUP_TYPE_ACCOUNT);
                person.reset();
            }
        }

        if person.memory(MEMORY_RECEIVED_INVITE_ID).is_some() {
            return Ok(Some(HedgeboxIntent::JoinFromInvite));
        }
        if person.memory(MEMORY_RECEIVED_FILE_ID).is_some() {
            return Ok(Some(HedgeboxIntent::SeeSharedFile));
        }

        let Some(account_id) = account_id(person) else {
            // Low-need prospects mostly don't bother
            let need = attribute(person, ATTR_NEED)?;
            if !person.random().chance(0.3 + need) {
                return Ok(None);
            }
            let intents = [
                (HedgeboxIntent::ConsiderProduct, 10.0),
                (HedgeboxIntent::CheckMariusTechTipsLink, 1.0),
            ];
            return Ok(Some(*person.random().weighted_choice(&intents)?));
        };

        let file_count = files(person)?.len() as f64;
        let plan = account_plan(ctx, &account_id);
        let team_size = account_u64(ctx, &account_id, "team_size");
        let removable = removable_members(ctx, &account_id, &person_id(person)?).len();
        let satisfaction = attribute(person, ATTR_SATISFACTION)?;

        // The more files, the likelier to manage them rather than upload more
        let mut intents = vec![
            (HedgeboxIntent::UploadFile, 1.0),
            (HedgeboxIntent::DeleteFile, if file_count > 0.0 { file_count.log10() / 8.0 } else { 0.0 }),
            (HedgeboxIntent::SeeOwnFile, if file_count > 0.0 { (file_count + 1.0).log10() } else { 0.0 }),
            (HedgeboxIntent::ShareFile, if file_count > 0.0 { file_count.log10() / 3.0 } else { 0.0 }),
        ];
        let used_mb = account_f64(ctx, &account_id, "used_mb");
        if satisfaction > 0.5 && plan.higher_plan().is_some() {
            intents.push((HedgeboxIntent::UpgradePlan, 0.1));
        } else if satisfaction < -0.5
            && plan
                .lower_plan()
                .is_some_and(|lower| used_mb <= lower.allowed_mb() as f64)
        {
            // Can't downgrade below what's already stored
            intents.push((HedgeboxIntent::DowngradePlan, 0.1));
        }
        let population = ctx.cluster.population as u64;
        if plan.is_business() && population > 1 {
            if team_size < population {
                intents.push((HedgeboxIntent::InviteTeamMember, 0.2));
            }
            if removable > 0 {
                intents.push((HedgeboxIntent::RemoveTeamMember, 0.025));
            }
        }
        Ok(Some(*person.random().weighted_choice(&intents)?))
    }

    fn run_session(&self, intent: HedgeboxIntent, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        self.update_signup_experiment(person)?;
        self.update_feature_flags(person, ctx);

        if intent.needs_login() && !person.client().is_logged_in() && !self.visit_login(person, ctx)? {
            return Ok(());
        }

        match intent {
            HedgeboxIntent::ConsiderProduct => self.consider_product(person, ctx)?,
            HedgeboxIntent::CheckMariusTechTipsLink => self.check_marius_tech_tips_link(person, ctx)?,
            HedgeboxIntent::UploadFile => self.upload_file(person, ctx)?,
            HedgeboxIntent::DeleteFile => self.delete_file(person, ctx)?,
            HedgeboxIntent::SeeOwnFile => self.see_own_file(person)?,
            HedgeboxIntent::ShareFile => self.share_file(person)?,
            HedgeboxIntent::SeeSharedFile => self.see_shared_file(person)?,
            HedgeboxIntent::InviteTeamMember => self.invite_team_member(person)?,
            HedgeboxIntent::RemoveTeamMember => self.remove_team_member(person, ctx)?,
            HedgeboxIntent::JoinFromInvite => self.join_from_invite(person, ctx)?,
            HedgeboxIntent::UpgradePlan | HedgeboxIntent::DowngradePlan => self.change_plan(person, ctx, intent)?,
        }

        // Some sessions end with logging out
        if person.client().is_logged_in() && person.random().chance(0.1) {
            person.reset();
        }
        Ok(())
    }
}

fn object(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => Properties::new(),
    }
}

fn attribute(person: &Person, name: &str) -> Result<f64, SimError> {
    person
        .attribute(name)
        .ok_or_else(|| SimError::UnknownAttribute(name.to_string()))
}

fn person_id(person: &Person) -> Result<String, SimError> {
    person
        .memory_str(MEMORY_PERSON_ID)
        .map(str::to_string)
        .ok_or_else(|| SimError::policy("person has no person_id"))
}

fn account_id(person: &Person) -> Option<String> {
    person.memory_str(MEMORY_ACCOUNT_ID).map(str::to_string)
}

fn require_account(person: &Person) -> Result<String, SimError> {
    account_id(person).ok_or_else(|| SimError::policy("person has no account"))
}

fn has_signed_up(person: &Person) -> bool {
    person.memory(MEMORY_ACCOUNT_ID).is_some()
}

fn is_company(ctx: &SimContext<'_>) -> bool {
    ctx.cluster.trait_str(TRAIT_COMPANY_NAME).is_some()
}

/// In a company only the kernel signs up; everyone else joins from an invite.
fn can_sign_up(person: &Person, ctx: &SimContext<'_>) -> bool {
    !is_company(ctx) || person.is_kernel()
}

fn account_plan(ctx: &SimContext<'_>, account_id: &str) -> HedgeboxPlan {
    ctx.groups()
        .get(GROUP_TYPE_ACCOUNT, account_id)
        .and_then(|account| account.get("plan"))
        .and_then(Value::as_str)
        .and_then(HedgeboxPlan::parse)
        .unwrap_or(HedgeboxPlan::PersonalFree)
}

fn account_u64(ctx: &SimContext<'_>, account_id: &str, key: &str) -> u64 {
    ctx.groups()
        .get(GROUP_TYPE_ACCOUNT, account_id)
        .and_then(|account| account.get(key))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn account_f64(ctx: &SimContext<'_>, account_id: &str, key: &str) -> f64 {
    ctx.groups()
        .get(GROUP_TYPE_ACCOUNT, account_id)
        .and_then(|account| account.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn account_members(ctx: &SimContext<'_>, account_id: &str) -> Vec<String> {
    ctx.groups()
        .get(GROUP_TYPE_ACCOUNT, account_id)
        .and_then(|account| account.get("members"))
        .and_then(Value::as_array)
        .map(|members| members.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Members other than the remover and the owner.
fn removable_members(ctx: &SimContext<'_>, account_id: &str, remover: &str) -> Vec<String> {
    let owner = ctx
        .groups()
        .get(GROUP_TYPE_ACCOUNT, account_id)
        .and_then(|account| account.get("owner"))
        .and_then(Value::as_str);
    account_members(ctx, account_id)
        .into_iter()
        .filter(|member| member != remover && Some(member.as_str()) != owner)
        .collect()
}

/// `team_size` always mirrors the member list.
fn members_update(members: &[String]) -> Properties {
    object(json!({ "members": members, "team_size": members.len() }))
}

fn files(person: &Person) -> Result<Vec<HedgeboxFile>, SimError> {
    match person.memory(MEMORY_FILES) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| SimError::policy(e.to_string())),
        None => Ok(Vec::new()),
    }
}

fn store_files(person: &mut Person, files: &[HedgeboxFile]) -> Result<(), SimError> {
    let value = serde_json::to_value(files).map_err(|e| SimError::policy(e.to_string()))?;
    person.remember(MEMORY_FILES, value);
    Ok(())
}

fn pick_index(person: &mut Person, len: usize, intent: HedgeboxIntent) -> Result<usize, SimError> {
    if len == 0 {
        return Err(SimError::unhandled_intent(intent));
    }
    Ok(person.random().int_range(0, len as i64 - 1) as usize)
}
