//! The Gherkin vocabulary
//!
//! Each module adds the steps of one area through `register`. Quoted
//! arguments are captured with `"([^"]*)"`; waits end in
//! `within N seconds|minutes`.

mod build;
mod deployment;
mod endpoints;
mod files;
mod http;
mod image;
mod login;
mod pod;
mod project;
mod quota;
mod resource;
mod role;
mod route;
mod secret;
mod service;
mod template;
mod user;

use crate::context::Context;
use crate::registry::StepRegistry;
use crate::wait::WaitOutcome;

/// Registry holding every step of the harness
pub fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();

    login::register(&mut registry);
    project::register(&mut registry);
    build::register(&mut registry);
    deployment::register(&mut registry);
    pod::register(&mut registry);
    service::register(&mut registry);
    endpoints::register(&mut registry);
    route::register(&mut registry);
    secret::register(&mut registry);
    template::register(&mut registry);
    quota::register(&mut registry);
    user::register(&mut registry);
    role::register(&mut registry);
    image::register(&mut registry);
    http::register(&mut registry);
    files::register(&mut registry);
    resource::register(&mut registry);

    registry
}

/// Record a failure unless the wait ended in `Complete`
fn check_outcome(ctx: &mut Context, what: &str, outcome: &WaitOutcome) -> bool {
    ctx.check(outcome.is_complete(), format!("{what} {outcome}"))
}

/// Record a failure unless `name` exists
fn check_exists(ctx: &mut Context, kind: &str, name: &str, exists: bool) -> bool {
    ctx.check(exists, format!("{kind} '{name}' does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Lookup, StepKind};

    #[test]
    fn test_registry_is_valid() {
        let registry = registry();
        registry.validate().unwrap();
        assert!(registry.len() > 50);
        assert_eq!(registry.hooks_for("loggedInFromEnvVars").len(), 1);
    }

    fn assert_unique(kind: StepKind, text: &str) {
        match registry().find(kind, text) {
            Lookup::Found { .. } => {}
            Lookup::Undefined => panic!("undefined: {text}"),
            Lookup::Ambiguous(p) => panic!("ambiguous: {text}: {p:?}"),
        }
    }

    #[test]
    fn test_vocabulary_resolves_unambiguously() {
        let phrases = [
            (StepKind::Given, r#"I login on "https://api:6443" with user "dev" and password "pw""#),
            (StepKind::Given, r#"I login on "https://api:6443" with token "sha256~x""#),
            (StepKind::Given, "I am logged in from environment variables"),
            (StepKind::When, "I log out"),
            (StepKind::Given, r#"I have a project "demo""#),
            (StepKind::When, r#"I create a project "demo""#),
            (StepKind::Given, r#"I use the project "demo""#),
            (StepKind::When, r#"I delete the project "demo""#),
            (StepKind::Then, r#"there should be a project "demo""#),
            (StepKind::Given, r#"I have a buildconfig "frontend""#),
            (StepKind::When, r#"I start a build of buildconfig "frontend""#),
            (StepKind::Then, r#"the build "frontend-1" should be complete within 10 minutes"#),
            (StepKind::Then, "the build should be complete within 300 seconds"),
            (StepKind::Then, r#"the latest build of buildconfig "frontend" should be complete within 5 minutes"#),
            (StepKind::Then, r#"there should be 2 builds of buildconfig "frontend""#),
            (StepKind::Given, r#"I have a deploymentconfig "frontend""#),
            (StepKind::When, r#"I trigger a new deployment of deploymentconfig "frontend""#),
            (StepKind::Then, r#"the deploymentconfig "frontend" should be deployed within 2 minutes"#),
            (StepKind::When, r#"I scale the deploymentconfig "frontend" to 3 replicas"#),
            (StepKind::Then, r#"the deploymentconfig "frontend" should have 1 replica"#),
            (StepKind::Then, r#"the pod "frontend-1-abcde" should be running"#),
            (StepKind::Then, r#"there should be 2 running pods with label "app=frontend""#),
            (StepKind::Then, r#"there should be 1 running pod with label "app=db" within 60 seconds"#),
            (StepKind::Then, r#"the logs of pod "db-1" should contain "ready""#),
            (StepKind::Given, r#"I have a service "frontend""#),
            (StepKind::Then, r#"the service "frontend" should expose port 8080"#),
            (StepKind::Then, r#"the service "frontend" should have 2 endpoints"#),
            (StepKind::Given, r#"I have a route "frontend""#),
            (StepKind::When, r#"I create a route "web" for service "frontend""#),
            (StepKind::Then, r#"the route "web" should have host "web.apps.example.com""#),
            (StepKind::Then, r#"the route "web" should point to service "frontend""#),
            (StepKind::Given, r#"I have a secret "db""#),
            (StepKind::When, r#"I create a secret "db" with:"#),
            (StepKind::Then, r#"the secret "db" should contain key "password""#),
            (StepKind::Given, r#"I have a template "mysql-ephemeral""#),
            (StepKind::When, r#"I create a new application based on the template "mysql-ephemeral""#),
            (StepKind::When, r#"I create a new application based on the template "mysql-ephemeral" with parameters:"#),
            (StepKind::Then, r#"the project should have a quota "compute""#),
            (StepKind::Then, r#"the quota "compute" should limit "pods" to "10""#),
            (StepKind::Then, r#"there should be a user "dev""#),
            (StepKind::Then, r#"there should be a service account "builder""#),
            (StepKind::When, r#"I grant the role "edit" to user "dev""#),
            (StepKind::Then, r#"the user "dev" should have the role "edit" in the project"#),
            (StepKind::Given, r#"I have an imagestream "frontend""#),
            (StepKind::Then, r#"the imagestream "frontend" should have tag "latest""#),
            (StepKind::When, r#"I open a tunnel "web" to pod "frontend-1-abcde" on port 8080"#),
            (StepKind::When, r#"I open a tunnel "web" to pod "frontend-1-abcde" on port 8080 from local port 18080"#),
            (StepKind::When, r#"I close the tunnel "web""#),
            (StepKind::Then, r#"an HTTP GET on tunnel "web" at path "/health" should return status 200"#),
            (StepKind::Then, r#"an HTTP GET on tunnel "web" at path "/" should contain "Welcome""#),
            (StepKind::Then, r#"the route "web" should respond with status 200"#),
            (StepKind::Then, r#"an HTTP GET on "http://example.com" should return status 200"#),
            (StepKind::When, r#"I apply the file "fixtures/app.yaml""#),
            (StepKind::When, "I apply the following resources:"),
            (StepKind::Then, r#"the resource "dc/frontend" should exist"#),
            (StepKind::Then, r#"the resource "bc/frontend" should not exist"#),
            (StepKind::When, r#"I delete the resource "route/web""#),
        ];

        for (kind, text) in phrases {
            assert_unique(kind, text);
        }
    }

    #[test]
    fn test_steps_work_after_any_keyword() {
        assert_unique(StepKind::Then, r#"I use the project "demo""#);
        assert_unique(StepKind::Given, r#"there should be a project "demo""#);
    }
}
