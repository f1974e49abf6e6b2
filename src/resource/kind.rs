use serde::{Deserialize, Serialize};

/// Components of the application VPC that are torn down individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpcPart {
    Vpc,
    Nat,
    Eip,
    Eni,
    SecurityGroup,
    Igw,
    Subnet,
    RouteTable,
    Endpoint,
}

/// OpenSearch Serverless policy flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Data,
    Network,
    Encryption,
}

impl PolicyKind {
    /// Value of the `--type` argument on the OpenSearch Serverless API
    pub fn api_type(&self) -> &'static str {
        match self {
            PolicyKind::Data => "data",
            PolicyKind::Network => "network",
            PolicyKind::Encryption => "encryption",
        }
    }
}

/// Every kind of live resource the engine knows how to find and remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    S3Bucket,
    LambdaFunction,
    LambdaLayer,
    ApiGateway,
    CognitoUserPool,
    LogGroup,
    Vpc(VpcPart),
    OpenSearchCollection,
    OpenSearchPolicy(PolicyKind),
    CloudFrontDistribution,
    XRaySamplingRule,
    SnsTopic,
    CloudWatchAlarm,
    IamRole,
    IamPolicy,
    KmsKey,
    BedrockKnowledgeBase,
}

impl ResourceType {
    /// All resource types, in discovery and display order
    pub fn all() -> Vec<ResourceType> {
        vec![
            ResourceType::CloudFrontDistribution,
            ResourceType::ApiGateway,
            ResourceType::CognitoUserPool,
            ResourceType::LambdaFunction,
            ResourceType::LambdaLayer,
            ResourceType::BedrockKnowledgeBase,
            ResourceType::OpenSearchCollection,
            ResourceType::OpenSearchPolicy(PolicyKind::Data),
            ResourceType::OpenSearchPolicy(PolicyKind::Network),
            ResourceType::OpenSearchPolicy(PolicyKind::Encryption),
            ResourceType::S3Bucket,
            ResourceType::LogGroup,
            ResourceType::XRaySamplingRule,
            ResourceType::CloudWatchAlarm,
            ResourceType::SnsTopic,
            ResourceType::Vpc(VpcPart::Endpoint),
            ResourceType::Vpc(VpcPart::Nat),
            ResourceType::Vpc(VpcPart::Eni),
            ResourceType::Vpc(VpcPart::Eip),
            ResourceType::Vpc(VpcPart::Igw),
            ResourceType::Vpc(VpcPart::Subnet),
            ResourceType::Vpc(VpcPart::RouteTable),
            ResourceType::Vpc(VpcPart::SecurityGroup),
            ResourceType::Vpc(VpcPart::Vpc),
            ResourceType::IamRole,
            ResourceType::IamPolicy,
            ResourceType::KmsKey,
        ]
    }

    /// Stable identifier used in logs, config files and CLI filters
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::S3Bucket => "s3_bucket",
            ResourceType::LambdaFunction => "lambda_function",
            ResourceType::LambdaLayer => "lambda_layer",
            ResourceType::ApiGateway => "api_gateway",
            ResourceType::CognitoUserPool => "cognito_user_pool",
            ResourceType::LogGroup => "log_group",
            ResourceType::Vpc(VpcPart::Vpc) => "vpc",
            ResourceType::Vpc(VpcPart::Nat) => "nat_gateway",
            ResourceType::Vpc(VpcPart::Eip) => "elastic_ip",
            ResourceType::Vpc(VpcPart::Eni) => "network_interface",
            ResourceType::Vpc(VpcPart::SecurityGroup) => "security_group",
            ResourceType::Vpc(VpcPart::Igw) => "internet_gateway",
            ResourceType::Vpc(VpcPart::Subnet) => "subnet",
            ResourceType::Vpc(VpcPart::RouteTable) => "route_table",
            ResourceType::Vpc(VpcPart::Endpoint) => "vpc_endpoint",
            ResourceType::OpenSearchCollection => "opensearch_collection",
            ResourceType::OpenSearchPolicy(PolicyKind::Data) => "opensearch_data_policy",
            ResourceType::OpenSearchPolicy(PolicyKind::Network) => "opensearch_network_policy",
            ResourceType::OpenSearchPolicy(PolicyKind::Encryption) => {
                "opensearch_encryption_policy"
            }
            ResourceType::CloudFrontDistribution => "cloudfront_distribution",
            ResourceType::XRaySamplingRule => "xray_sampling_rule",
            ResourceType::SnsTopic => "sns_topic",
            ResourceType::CloudWatchAlarm => "cloudwatch_alarm",
            ResourceType::IamRole => "iam_role",
            ResourceType::IamPolicy => "iam_policy",
            ResourceType::KmsKey => "kms_key",
            ResourceType::BedrockKnowledgeBase => "bedrock_knowledge_base",
        }
    }

    /// Parse the stable identifier back into a type
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::all().into_iter().find(|t| t.as_str() == slug)
    }

    /// Human-readable label for tables
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceType::S3Bucket => "S3 Bucket",
            ResourceType::LambdaFunction => "Lambda Function",
            ResourceType::LambdaLayer => "Lambda Layer",
            ResourceType::ApiGateway => "API Gateway",
            ResourceType::CognitoUserPool => "Cognito User Pool",
            ResourceType::LogGroup => "Log Group",
            ResourceType::Vpc(VpcPart::Vpc) => "VPC",
            ResourceType::Vpc(VpcPart::Nat) => "NAT Gateway",
            ResourceType::Vpc(VpcPart::Eip) => "Elastic IP",
            ResourceType::Vpc(VpcPart::Eni) => "Network Interface",
            ResourceType::Vpc(VpcPart::SecurityGroup) => "Security Group",
            ResourceType::Vpc(VpcPart::Igw) => "Internet Gateway",
            ResourceType::Vpc(VpcPart::Subnet) => "Subnet",
            ResourceType::Vpc(VpcPart::RouteTable) => "Route Table",
            ResourceType::Vpc(VpcPart::Endpoint) => "VPC Endpoint",
            ResourceType::OpenSearchCollection => "OpenSearch Collection",
            ResourceType::OpenSearchPolicy(PolicyKind::Data) => "OpenSearch Data Policy",
            ResourceType::OpenSearchPolicy(PolicyKind::Network) => "OpenSearch Network Policy",
            ResourceType::OpenSearchPolicy(PolicyKind::Encryption) => {
                "OpenSearch Encryption Policy"
            }
            ResourceType::CloudFrontDistribution => "CloudFront Distribution",
            ResourceType::XRaySamplingRule => "X-Ray Sampling Rule",
            ResourceType::SnsTopic => "SNS Topic",
            ResourceType::CloudWatchAlarm => "CloudWatch Alarm",
            ResourceType::IamRole => "IAM Role",
            ResourceType::IamPolicy => "IAM Policy",
            ResourceType::KmsKey => "KMS Key",
            ResourceType::BedrockKnowledgeBase => "Bedrock Knowledge Base",
        }
    }

    /// The Terraform/OpenTofu resource type that declares this resource
    pub fn iac_type(&self) -> &'static str {
        match self {
            ResourceType::S3Bucket => "aws_s3_bucket",
            ResourceType::LambdaFunction => "aws_lambda_function",
            ResourceType::LambdaLayer => "aws_lambda_layer_version",
            ResourceType::ApiGateway => "aws_api_gateway_rest_api",
            ResourceType::CognitoUserPool => "aws_cognito_user_pool",
            ResourceType::LogGroup => "aws_cloudwatch_log_group",
            ResourceType::Vpc(VpcPart::Vpc) => "aws_vpc",
            ResourceType::Vpc(VpcPart::Nat) => "aws_nat_gateway",
            ResourceType::Vpc(VpcPart::Eip) => "aws_eip",
            ResourceType::Vpc(VpcPart::Eni) => "aws_network_interface",
            ResourceType::Vpc(VpcPart::SecurityGroup) => "aws_security_group",
            ResourceType::Vpc(VpcPart::Igw) => "aws_internet_gateway",
            ResourceType::Vpc(VpcPart::Subnet) => "aws_subnet",
            ResourceType::Vpc(VpcPart::RouteTable) => "aws_route_table",
            ResourceType::Vpc(VpcPart::Endpoint) => "aws_vpc_endpoint",
            ResourceType::OpenSearchCollection => "aws_opensearchserverless_collection",
            ResourceType::OpenSearchPolicy(PolicyKind::Data) => {
                "aws_opensearchserverless_access_policy"
            }
            ResourceType::OpenSearchPolicy(_) => "aws_opensearchserverless_security_policy",
            ResourceType::CloudFrontDistribution => "aws_cloudfront_distribution",
            ResourceType::XRaySamplingRule => "aws_xray_sampling_rule",
            ResourceType::SnsTopic => "aws_sns_topic",
            ResourceType::CloudWatchAlarm => "aws_cloudwatch_metric_alarm",
            ResourceType::IamRole => "aws_iam_role",
            ResourceType::IamPolicy => "aws_iam_policy",
            ResourceType::KmsKey => "aws_kms_key",
            ResourceType::BedrockKnowledgeBase => "aws_bedrockagent_knowledge_base",
        }
    }

    /// Map a Terraform/OpenTofu type back to a resource type.
    ///
    /// OpenSearch security policies share one IaC type; the policy kind is
    /// read from the `type` attribute when available.
    pub fn from_iac_type(iac_type: &str, policy_type: Option<&str>) -> Option<Self> {
        match iac_type {
            "aws_opensearchserverless_security_policy" => match policy_type {
                Some("network") => Some(ResourceType::OpenSearchPolicy(PolicyKind::Network)),
                _ => Some(ResourceType::OpenSearchPolicy(PolicyKind::Encryption)),
            },
            "aws_apigatewayv2_api" => Some(ResourceType::ApiGateway),
            other => Self::all().into_iter().find(|t| t.iac_type() == other),
        }
    }

    /// Whether importing a live resource of this type into declared state is
    /// a safe default. ENIs and EIPs are side effects of Lambda and NAT
    /// gateways and must not be adopted automatically.
    pub fn is_importable(&self) -> bool {
        !matches!(
            self,
            ResourceType::Vpc(VpcPart::Eni) | ResourceType::Vpc(VpcPart::Eip)
        )
    }

    /// Whether the resource is global (not scoped to the run's region)
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            ResourceType::CloudFrontDistribution | ResourceType::IamRole | ResourceType::IamPolicy
        )
    }

    /// Build the ID the IaC import primitive expects for this type
    pub fn import_id(&self, native_id: &str) -> String {
        match self {
            ResourceType::OpenSearchPolicy(kind) => format!("{}/{}", native_id, kind.api_type()),
            _ => native_id.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_types_have_unique_slugs() {
        let all = ResourceType::all();
        let slugs: HashSet<_> = all.iter().map(|t| t.as_str()).collect();
        assert_eq!(slugs.len(), all.len());
        assert_eq!(all.len(), 27);
    }

    #[test]
    fn test_slug_roundtrip() {
        assert_eq!(
            ResourceType::from_slug("nat_gateway"),
            Some(ResourceType::Vpc(VpcPart::Nat))
        );
        assert_eq!(ResourceType::from_slug("unknown"), None);
    }

    #[test]
    fn test_from_iac_type() {
        assert_eq!(
            ResourceType::from_iac_type("aws_s3_bucket", None),
            Some(ResourceType::S3Bucket)
        );
        assert_eq!(
            ResourceType::from_iac_type("aws_opensearchserverless_security_policy", Some("network")),
            Some(ResourceType::OpenSearchPolicy(PolicyKind::Network))
        );
        assert_eq!(
            ResourceType::from_iac_type("aws_opensearchserverless_access_policy", None),
            Some(ResourceType::OpenSearchPolicy(PolicyKind::Data))
        );
        assert_eq!(ResourceType::from_iac_type("aws_instance", None), None);
    }

    #[test]
    fn test_import_id_for_policies() {
        let policy = ResourceType::OpenSearchPolicy(PolicyKind::Encryption);
        assert_eq!(policy.import_id("rag-enc"), "rag-enc/encryption");
        assert_eq!(ResourceType::S3Bucket.import_id("bucket"), "bucket");
    }

    #[test]
    fn test_side_effect_resources_not_importable() {
        assert!(!ResourceType::Vpc(VpcPart::Eni).is_importable());
        assert!(!ResourceType::Vpc(VpcPart::Eip).is_importable());
        assert!(ResourceType::S3Bucket.is_importable());
    }
}
