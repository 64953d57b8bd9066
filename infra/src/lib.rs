//! Resource topology for the upload classifier: one bucket, one function,
//! the object-created notification between them and a TLS-only bucket policy.
//! [`Stack::synth`] renders it as a CloudFormation template.

use serde_json::{json, Value};

pub const BUCKET_ID: &str = "ProcessingBucket";
pub const BUCKET_POLICY_ID: &str = "ProcessingBucketPolicy";
pub const FUNCTION_ID: &str = "FileProcessor";
pub const ROLE_ID: &str = "FileProcessorRole";
pub const PERMISSION_ID: &str = "FileProcessorInvokePermission";
pub const AUTO_DELETE_ID: &str = "ProcessingBucketAutoDeleteObjects";
pub const AUTO_DELETE_FUNCTION_ID: &str = "AutoDeleteObjectsHandler";
pub const AUTO_DELETE_ROLE_ID: &str = "AutoDeleteObjectsRole";

/// Custom resource handler that empties the bucket, every object version and
/// delete marker included, when the stack is torn down.
const AUTO_DELETE_SOURCE: &str = r#"import boto3
import cfnresponse


def handler(event, context):
    status = cfnresponse.SUCCESS
    try:
        if event["RequestType"] == "Delete":
            name = event["ResourceProperties"]["BucketName"]
            boto3.resource("s3").Bucket(name).object_versions.delete()
    except Exception as err:
        print(f"auto-delete failed: {err}")
        status = cfnresponse.FAILED
    cfnresponse.send(event, context, status, {}, event.get("PhysicalResourceId") or context.log_stream_name)
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub stack_name: String,
    /// Account id and region are appended to keep the name globally unique.
    pub bucket_prefix: String,
    pub function_name: String,
    pub memory_mb: u32,
    pub timeout_secs: u32,
    pub key_suffix: String,
    pub runtime: String,
    pub architecture: String,
    pub handler: String,
    /// Empty the bucket on stack deletion so the versioned bucket can go too.
    pub auto_delete_objects: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "UploadClassifierStack".to_owned(),
            bucket_prefix: "upload-classifier-bucket".to_owned(),
            function_name: "FileProcessorFunction".to_owned(),
            memory_mb: 128,
            timeout_secs: 30,
            key_suffix: ".txt".to_owned(),
            runtime: "provided.al2023".to_owned(),
            architecture: "arm64".to_owned(),
            handler: "bootstrap".to_owned(),
            auto_delete_objects: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stack {
    config: StackConfig,
}

impl Stack {
    pub fn new(config: StackConfig) -> Self {
        Self { config }
    }

    // Name and ARN are spelled out with Fn::Sub rather than Ref/GetAtt: the
    // bucket's notification depends on the permission, which must not depend
    // back on the bucket.
    fn bucket_name(&self) -> Value {
        json!({ "Fn::Sub": format!("{}-${{AWS::AccountId}}-${{AWS::Region}}", self.config.bucket_prefix) })
    }

    fn bucket_arn(&self) -> Value {
        json!({ "Fn::Sub": format!("arn:${{AWS::Partition}}:s3:::{}-${{AWS::AccountId}}-${{AWS::Region}}", self.config.bucket_prefix) })
    }

    fn bucket_objects_arn(&self) -> Value {
        json!({ "Fn::Sub": format!("arn:${{AWS::Partition}}:s3:::{}-${{AWS::AccountId}}-${{AWS::Region}}/*", self.config.bucket_prefix) })
    }

    fn bucket(&self) -> Value {
        json!({
            "Type": "AWS::S3::Bucket",
            "DeletionPolicy": "Delete",
            "UpdateReplacePolicy": "Delete",
            "DependsOn": [PERMISSION_ID],
            "Properties": {
                "BucketName": self.bucket_name(),
                "VersioningConfiguration": { "Status": "Enabled" },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true
                },
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                    }]
                },
                "NotificationConfiguration": {
                    "LambdaConfigurations": [{
                        "Event": "s3:ObjectCreated:*",
                        "Filter": {
                            "S3Key": {
                                "Rules": [{ "Name": "suffix", "Value": self.config.key_suffix }]
                            }
                        },
                        "Function": { "Fn::GetAtt": [FUNCTION_ID, "Arn"] }
                    }]
                }
            }
        })
    }

    fn bucket_policy(&self) -> Value {
        json!({
            "Type": "AWS::S3::BucketPolicy",
            "Properties": {
                "Bucket": { "Ref": BUCKET_ID },
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Deny",
                        "Principal": { "AWS": "*" },
                        "Action": "s3:*",
                        "Resource": [self.bucket_arn(), self.bucket_objects_arn()],
                        "Condition": { "Bool": { "aws:SecureTransport": "false" } }
                    }]
                }
            }
        })
    }

    fn role(&self) -> Value {
        json!({
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                },
                "ManagedPolicyArns": [{
                    "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
                }],
                "Policies": [{
                    "PolicyName": "ReadProcessingBucket",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": ["s3:GetObject*", "s3:GetBucket*", "s3:List*"],
                            "Resource": [self.bucket_arn(), self.bucket_objects_arn()]
                        }]
                    }
                }]
            }
        })
    }

    fn function(&self) -> Value {
        json!({
            "Type": "AWS::Lambda::Function",
            "Properties": {
                "FunctionName": self.config.function_name,
                "Runtime": self.config.runtime,
                "Architectures": [self.config.architecture],
                "Handler": self.config.handler,
                "Code": {
                    "S3Bucket": { "Ref": "CodeBucket" },
                    "S3Key": { "Ref": "CodeKey" }
                },
                "MemorySize": self.config.memory_mb,
                "Timeout": self.config.timeout_secs,
                "Role": { "Fn::GetAtt": [ROLE_ID, "Arn"] },
                "Environment": {
                    "Variables": { "BUCKET_NAME": self.bucket_name() }
                }
            }
        })
    }

    fn permission(&self) -> Value {
        json!({
            "Type": "AWS::Lambda::Permission",
            "Properties": {
                "Action": "lambda:InvokeFunction",
                "FunctionName": { "Fn::GetAtt": [FUNCTION_ID, "Arn"] },
                "Principal": "s3.amazonaws.com",
                "SourceAccount": { "Ref": "AWS::AccountId" },
                "SourceArn": self.bucket_arn()
            }
        })
    }

    fn auto_delete_role(&self) -> Value {
        json!({
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                },
                "ManagedPolicyArns": [{
                    "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
                }],
                "Policies": [{
                    "PolicyName": "EmptyProcessingBucket",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": [
                                "s3:GetBucket*",
                                "s3:List*",
                                "s3:DeleteObject*"
                            ],
                            "Resource": [self.bucket_arn(), self.bucket_objects_arn()]
                        }]
                    }
                }]
            }
        })
    }

    fn auto_delete_function(&self) -> Value {
        json!({
            "Type": "AWS::Lambda::Function",
            "Properties": {
                "Runtime": "python3.12",
                "Handler": "index.handler",
                "Code": { "ZipFile": AUTO_DELETE_SOURCE },
                "MemorySize": 128,
                "Timeout": 900,
                "Role": { "Fn::GetAtt": [AUTO_DELETE_ROLE_ID, "Arn"] },
                "Description": format!("Empties the {} bucket before it is deleted", self.config.bucket_prefix)
            }
        })
    }

    // Referencing the bucket makes CloudFormation delete this resource, and
    // so empty the bucket, before the bucket itself.
    fn auto_delete(&self) -> Value {
        json!({
            "Type": "Custom::S3AutoDeleteObjects",
            "DeletionPolicy": "Delete",
            "UpdateReplacePolicy": "Delete",
            "DependsOn": [BUCKET_POLICY_ID],
            "Properties": {
                "ServiceToken": { "Fn::GetAtt": [AUTO_DELETE_FUNCTION_ID, "Arn"] },
                "BucketName": { "Ref": BUCKET_ID }
            }
        })
    }

    pub fn synth(&self) -> Value {
        let mut template = self.base_template();
        if self.config.auto_delete_objects {
            if let Some(resources) = template["Resources"].as_object_mut() {
                resources.insert(AUTO_DELETE_ROLE_ID.to_owned(), self.auto_delete_role());
                resources.insert(AUTO_DELETE_FUNCTION_ID.to_owned(), self.auto_delete_function());
                resources.insert(AUTO_DELETE_ID.to_owned(), self.auto_delete());
            }
        }
        template
    }

    fn base_template(&self) -> Value {
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": format!("{}: S3 uploads classified by a Lambda function", self.config.stack_name),
            "Parameters": {
                "CodeBucket": {
                    "Type": "String",
                    "Description": "Bucket holding the zipped bootstrap binary"
                },
                "CodeKey": {
                    "Type": "String",
                    "Description": "Key of the zipped bootstrap binary"
                }
            },
            "Resources": {
                BUCKET_ID: self.bucket(),
                BUCKET_POLICY_ID: self.bucket_policy(),
                ROLE_ID: self.role(),
                FUNCTION_ID: self.function(),
                PERMISSION_ID: self.permission()
            },
            "Outputs": {
                "BucketName": { "Value": { "Ref": BUCKET_ID } },
                "LambdaFunction": { "Value": { "Ref": FUNCTION_ID } }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Value {
        Stack::new(StackConfig::default()).synth()
    }

    fn resource(template: &Value, id: &str) -> Value {
        template["Resources"][id].clone()
    }

    #[test]
    fn test_bucket_is_locked_down() {
        let bucket = resource(&template(), BUCKET_ID);
        assert_eq!(bucket["Type"], "AWS::S3::Bucket");
        assert_eq!(bucket["DeletionPolicy"], "Delete");
        let props = &bucket["Properties"];
        assert_eq!(props["VersioningConfiguration"]["Status"], "Enabled");
        for flag in [
            "BlockPublicAcls",
            "BlockPublicPolicy",
            "IgnorePublicAcls",
            "RestrictPublicBuckets",
        ] {
            assert_eq!(props["PublicAccessBlockConfiguration"][flag], true, "{flag}");
        }
        assert_eq!(
            props["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "AES256"
        );
        assert_eq!(
            props["BucketName"]["Fn::Sub"],
            "upload-classifier-bucket-${AWS::AccountId}-${AWS::Region}"
        );
    }

    #[test]
    fn test_notification_filters_txt_creates() {
        let bucket = resource(&template(), BUCKET_ID);
        let notification =
            &bucket["Properties"]["NotificationConfiguration"]["LambdaConfigurations"][0];
        assert_eq!(notification["Event"], "s3:ObjectCreated:*");
        assert_eq!(
            notification["Filter"]["S3Key"]["Rules"],
            json!([{ "Name": "suffix", "Value": ".txt" }])
        );
        assert_eq!(notification["Function"]["Fn::GetAtt"][0], FUNCTION_ID);
        assert_eq!(bucket["DependsOn"], json!([PERMISSION_ID]));
    }

    #[test]
    fn test_policy_denies_insecure_transport() {
        let policy = resource(&template(), BUCKET_POLICY_ID);
        let statement = &policy["Properties"]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Deny");
        assert_eq!(statement["Action"], "s3:*");
        assert_eq!(statement["Condition"]["Bool"]["aws:SecureTransport"], "false");
        assert_eq!(statement["Resource"].as_array().unwrap().len(), 2);
        assert_eq!(policy["Properties"]["Bucket"]["Ref"], BUCKET_ID);
    }

    #[test]
    fn test_function_budget_and_environment() {
        let function = resource(&template(), FUNCTION_ID);
        let props = &function["Properties"];
        assert_eq!(props["FunctionName"], "FileProcessorFunction");
        assert_eq!(props["MemorySize"], 128);
        assert_eq!(props["Timeout"], 30);
        assert_eq!(props["Handler"], "bootstrap");
        assert_eq!(
            props["Environment"]["Variables"]["BUCKET_NAME"],
            resource(&template(), BUCKET_ID)["Properties"]["BucketName"]
        );
    }

    #[test]
    fn test_role_grants_read_only() {
        let role = resource(&template(), ROLE_ID);
        let statement = &role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        let actions: Vec<&str> = statement["Action"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(actions.iter().all(|a| !a.starts_with("s3:Put") && !a.starts_with("s3:Delete")));
    }

    #[test]
    fn test_permission_scoped_to_bucket() {
        let template = template();
        let permission = resource(&template, PERMISSION_ID);
        assert_eq!(permission["Properties"]["Principal"], "s3.amazonaws.com");
        assert_eq!(
            permission["Properties"]["SourceArn"],
            template["Resources"][BUCKET_POLICY_ID]["Properties"]["PolicyDocument"]["Statement"]
                [0]["Resource"][0]
        );
        // the permission must not reference the bucket resource directly
        assert!(!permission.to_string().contains(BUCKET_ID));
    }

    #[test]
    fn test_bucket_is_emptied_before_deletion() {
        let template = template();
        let custom = resource(&template, AUTO_DELETE_ID);
        assert_eq!(custom["Type"], "Custom::S3AutoDeleteObjects");
        assert_eq!(custom["Properties"]["BucketName"]["Ref"], BUCKET_ID);
        assert_eq!(
            custom["Properties"]["ServiceToken"]["Fn::GetAtt"],
            json!([AUTO_DELETE_FUNCTION_ID, "Arn"])
        );

        let handler = resource(&template, AUTO_DELETE_FUNCTION_ID);
        assert_eq!(handler["Properties"]["Role"]["Fn::GetAtt"][0], AUTO_DELETE_ROLE_ID);
        let source = handler["Properties"]["Code"]["ZipFile"].as_str().unwrap();
        assert!(source.contains("object_versions.delete()"));
        assert!(source.contains(r#"event["RequestType"] == "Delete""#));

        let role = resource(&template, AUTO_DELETE_ROLE_ID);
        let statement = &role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert!(statement["Action"]
            .as_array()
            .unwrap()
            .contains(&json!("s3:DeleteObject*")));
        assert_eq!(
            statement["Resource"],
            template["Resources"][BUCKET_POLICY_ID]["Properties"]["PolicyDocument"]["Statement"]
                [0]["Resource"]
        );
    }

    #[test]
    fn test_auto_delete_can_be_disabled() {
        let template = Stack::new(StackConfig {
            auto_delete_objects: false,
            ..StackConfig::default()
        })
        .synth();
        let resources = template["Resources"].as_object().unwrap();
        for id in [AUTO_DELETE_ID, AUTO_DELETE_FUNCTION_ID, AUTO_DELETE_ROLE_ID] {
            assert!(!resources.contains_key(id), "{id}");
        }
        assert_eq!(resources.len(), 5);
        assert_eq!(template["Resources"][BUCKET_ID]["DeletionPolicy"], "Delete");
    }

    #[test]
    fn test_outputs_and_custom_config() {
        let stack = Stack::new(StackConfig {
            bucket_prefix: "acme-uploads".to_owned(),
            key_suffix: ".log".to_owned(),
            memory_mb: 256,
            ..StackConfig::default()
        });
        let template = stack.synth();
        assert_eq!(template["Outputs"]["BucketName"]["Value"]["Ref"], BUCKET_ID);
        assert_eq!(template["Outputs"]["LambdaFunction"]["Value"]["Ref"], FUNCTION_ID);
        assert_eq!(
            template["Resources"][BUCKET_ID]["Properties"]["NotificationConfiguration"]
                ["LambdaConfigurations"][0]["Filter"]["S3Key"]["Rules"][0]["Value"],
            ".log"
        );
        assert_eq!(template["Resources"][FUNCTION_ID]["Properties"]["MemorySize"], 256);
        assert!(template["Resources"][BUCKET_ID]["Properties"]["BucketName"]["Fn::Sub"]
            .as_str()
            .unwrap()
            .starts_with("acme-uploads-"));
    }
}
