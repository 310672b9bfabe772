/// `GroupVersionResource` identifies a resource type on the cluster
///
/// OpenShift kinds have no `k8s-openapi` types, so they are read and
/// written through the dynamic client addressed by a `Gvr`.
///
/// # Example
///
/// ```ignore
/// let build = ctx.get_dynamic(&Gvr::build(), "frontend-1").await?;
/// let phase = build.data["status"]["phase"].as_str();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gvr {
    /// API group ("" for core, e.g. "build.openshift.io")
    pub group: String,
    /// API version (e.g., "v1")
    pub version: String,
    /// Resource name (plural, e.g., "builds")
    pub resource: String,
    /// Kind name (e.g., "Build")
    pub kind: String,
    /// False for cluster-scoped resources such as projects and users
    pub namespaced: bool,
}

impl Gvr {
    /// Create a new namespaced `GroupVersionResource`
    #[must_use]
    pub fn new(group: &str, version: &str, resource: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
            kind: kind.to_string(),
            namespaced: true,
        }
    }

    /// Mark the resource as cluster-scoped
    #[must_use]
    pub fn cluster_scoped(mut self) -> Self {
        self.namespaced = false;
        self
    }

    /// Core (`v1`) resource
    #[must_use]
    pub fn core(resource: &str, kind: &str) -> Self {
        Self::new("", "v1", resource, kind)
    }

    #[must_use]
    pub fn build() -> Self {
        Self::new("build.openshift.io", "v1", "builds", "Build")
    }

    #[must_use]
    pub fn build_config() -> Self {
        Self::new("build.openshift.io", "v1", "buildconfigs", "BuildConfig")
    }

    #[must_use]
    pub fn deployment_config() -> Self {
        Self::new(
            "apps.openshift.io",
            "v1",
            "deploymentconfigs",
            "DeploymentConfig",
        )
    }

    #[must_use]
    pub fn route() -> Self {
        Self::new("route.openshift.io", "v1", "routes", "Route")
    }

    #[must_use]
    pub fn image_stream() -> Self {
        Self::new("image.openshift.io", "v1", "imagestreams", "ImageStream")
    }

    #[must_use]
    pub fn template() -> Self {
        Self::new("template.openshift.io", "v1", "templates", "Template")
    }

    /// Namespaced endpoint that renders a posted template
    #[must_use]
    pub fn processed_template() -> Self {
        Self::new(
            "template.openshift.io",
            "v1",
            "processedtemplates",
            "Template",
        )
    }

    #[must_use]
    pub fn project() -> Self {
        Self::new("project.openshift.io", "v1", "projects", "Project").cluster_scoped()
    }

    #[must_use]
    pub fn project_request() -> Self {
        Self::new(
            "project.openshift.io",
            "v1",
            "projectrequests",
            "ProjectRequest",
        )
        .cluster_scoped()
    }

    #[must_use]
    pub fn user() -> Self {
        Self::new("user.openshift.io", "v1", "users", "User").cluster_scoped()
    }

    /// `apiVersion` string, e.g. `build.openshift.io/v1` or `v1`
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Convert to kube `ApiResource`
    pub(crate) fn to_api_resource(&self) -> kube::core::ApiResource {
        kube::core::ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.resource.clone(),
        }
    }
}

/// A `kind/name` reference resolved to a resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub gvr: Gvr,
    pub name: String,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.gvr.kind, self.name)
    }
}
