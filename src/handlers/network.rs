//! Application VPC and everything inside it.
//!
//! Children are discovered through their VPC: anything inside a VPC whose
//! name, ID or tags match the scope belongs to the run, except the default
//! security group and the main route table which go away with the VPC.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, ec2_tags, str_at, AwsRequest};
use crate::error::{EngineResult, ErrorKind};
use crate::resource::{ResourceDescriptor, ResourceType, VpcPart};
use crate::retry::{poll_until, PollStatus};

pub fn handler_for(part: VpcPart) -> Box<dyn ResourceHandler> {
    Box::new(VpcPartHandler { part })
}

fn ec2(operation: &str) -> AwsRequest {
    AwsRequest::new("ec2", operation)
}

fn vpc_filter(vpc_ids: &[String]) -> String {
    format!("Name=vpc-id,Values={}", vpc_ids.join(","))
}

/// A VPC that belongs to the run
#[derive(Debug, Clone)]
pub struct MatchedVpc {
    pub id: String,
    pub name: String,
    pub tags: HashMap<String, String>,
}

/// Non-default VPCs whose Name tag, ID or tag values match the scope
pub fn matching_vpcs(ctx: &HandlerContext) -> EngineResult<Vec<MatchedVpc>> {
    let response = ctx.call(ec2("describe-vpcs"))?;
    Ok(array_at(&response, &["Vpcs"])
        .iter()
        .filter(|vpc| !vpc.get("IsDefault").and_then(|v| v.as_bool()).unwrap_or(false))
        .filter_map(|vpc| {
            let id = str_at(vpc, "VpcId")?.to_string();
            let tags = ec2_tags(vpc);
            let name = tags.get("Name").cloned().unwrap_or_else(|| id.clone());
            ctx.scope
                .matches(&name, &id, &tags)
                .then_some(MatchedVpc { id, name, tags })
        })
        .collect())
}

/// Descriptor named after the `Name` tag when present
fn child_descriptor(
    ctx: &HandlerContext,
    part: VpcPart,
    id: &str,
    item: &Value,
    vpc_id: Option<&str>,
) -> ResourceDescriptor {
    let tags = ec2_tags(item);
    let name = tags.get("Name").cloned().unwrap_or_else(|| id.to_string());
    let mut descriptor = ctx
        .descriptor(ResourceType::Vpc(part), id)
        .with_name(name)
        .with_tags(tags);
    if let Some(vpc_id) = vpc_id {
        descriptor = descriptor.with_attribute("vpc_id", vpc_id);
    }
    descriptor
}

/// Retry a delete that fails while dependents are still being released
fn delete_when_released(ctx: &HandlerContext, label: &str, request: AwsRequest) -> EngineResult<()> {
    let result = poll_until(&ctx.waits.eni, &format!("{} to be released", label), |_| {
        match ctx.call(request.clone()) {
            Ok(_) => Ok(PollStatus::Ready(())),
            Err(err) if err.is_not_found() => Ok(PollStatus::Ready(())),
            Err(ErrorKind::DependencyConflict { .. }) => {
                Ok(PollStatus::Pending("dependency violation".to_string()))
            }
            Err(err) => Err(err),
        }
    });
    match result {
        Err(ErrorKind::Timeout { .. }) => Err(ErrorKind::DependencyConflict {
            resource: label.to_string(),
            blockers: Vec::new(),
        }),
        other => other,
    }
}

/// `eni-... (status): description` for ENIs matching `filter`
fn describe_enis(ctx: &HandlerContext, filter: String) -> EngineResult<Vec<String>> {
    let response = ctx.call(ec2("describe-network-interfaces").arg("filters", filter))?;
    Ok(array_at(&response, &["NetworkInterfaces"])
        .iter()
        .filter_map(|eni| {
            let id = str_at(eni, "NetworkInterfaceId")?;
            let status = str_at(eni, "Status").unwrap_or("unknown");
            let description = str_at(eni, "Description").unwrap_or_default();
            Some(if description.is_empty() {
                format!("{} ({})", id, status)
            } else {
                format!("{} ({}): {}", id, status, description)
            })
        })
        .collect())
}

pub struct VpcPartHandler {
    part: VpcPart,
}

impl VpcPartHandler {
    fn discover_children(
        &self,
        ctx: &HandlerContext,
        vpcs: &[MatchedVpc],
    ) -> EngineResult<Vec<ResourceDescriptor>> {
        let ids: Vec<String> = vpcs.iter().map(|v| v.id.clone()).collect();
        let part = self.part;

        let found = match part {
            VpcPart::Vpc => vpcs
                .iter()
                .map(|vpc| {
                    ctx.descriptor(ResourceType::Vpc(VpcPart::Vpc), &vpc.id)
                        .with_name(&vpc.name)
                        .with_tags(vpc.tags.clone())
                })
                .collect(),
            VpcPart::Nat => {
                let response = ctx.call(ec2("describe-nat-gateways").arg("filter", vpc_filter(&ids)))?;
                array_at(&response, &["NatGateways"])
                    .iter()
                    .filter(|nat| !matches!(str_at(nat, "State"), Some("deleted")))
                    .filter_map(|nat| {
                        let id = str_at(nat, "NatGatewayId")?;
                        let allocations: Vec<&str> = array_at(nat, &["NatGatewayAddresses"])
                            .iter()
                            .filter_map(|a| str_at(a, "AllocationId"))
                            .collect();
                        Some(
                            child_descriptor(ctx, part, id, nat, str_at(nat, "VpcId"))
                                .with_attribute("state", str_at(nat, "State").unwrap_or("unknown"))
                                .with_attribute("allocation_ids", allocations.join(",")),
                        )
                    })
                    .collect()
            }
            VpcPart::Eip => {
                let nat_allocations: HashSet<String> = if ids.is_empty() {
                    HashSet::new()
                } else {
                    let response =
                        ctx.call(ec2("describe-nat-gateways").arg("filter", vpc_filter(&ids)))?;
                    array_at(&response, &["NatGateways"])
                        .iter()
                        .flat_map(|nat| array_at(nat, &["NatGatewayAddresses"]).iter())
                        .filter_map(|a| str_at(a, "AllocationId").map(str::to_string))
                        .collect()
                };
                let response = ctx.call(ec2("describe-addresses"))?;
                array_at(&response, &["Addresses"])
                    .iter()
                    .filter_map(|address| {
                        let id = str_at(address, "AllocationId")?;
                        let tags = ec2_tags(address);
                        let name = tags.get("Name").map(|s| s.as_str()).unwrap_or(id);
                        let owned = nat_allocations.contains(id) || ctx.scope.matches(name, id, &tags);
                        if !owned {
                            return None;
                        }
                        let mut descriptor = child_descriptor(ctx, part, id, address, None);
                        if let Some(association) = str_at(address, "AssociationId") {
                            descriptor = descriptor.with_attribute("association_id", association);
                        }
                        if let Some(ip) = str_at(address, "PublicIp") {
                            descriptor = descriptor.with_attribute("public_ip", ip);
                        }
                        Some(descriptor)
                    })
                    .collect()
            }
            VpcPart::Eni => {
                let response = ctx.call(
                    ec2("describe-network-interfaces").arg("filters", vpc_filter(&ids)),
                )?;
                array_at(&response, &["NetworkInterfaces"])
                    .iter()
                    .filter_map(|eni| {
                        let id = str_at(eni, "NetworkInterfaceId")?;
                        let mut descriptor = child_descriptor(ctx, part, id, eni, str_at(eni, "VpcId"))
                            .with_attribute("status", str_at(eni, "Status").unwrap_or("unknown"))
                            .with_attribute(
                                "description",
                                str_at(eni, "Description").unwrap_or_default(),
                            );
                        if let Some(kind) = str_at(eni, "InterfaceType") {
                            descriptor = descriptor.with_attribute("interface_type", kind);
                        }
                        Some(descriptor)
                    })
                    .collect()
            }
            VpcPart::SecurityGroup => {
                let response =
                    ctx.call(ec2("describe-security-groups").arg("filters", vpc_filter(&ids)))?;
                array_at(&response, &["SecurityGroups"])
                    .iter()
                    .filter(|sg| str_at(sg, "GroupName") != Some("default"))
                    .filter_map(|sg| {
                        let id = str_at(sg, "GroupId")?;
                        let mut descriptor = child_descriptor(ctx, part, id, sg, str_at(sg, "VpcId"));
                        if descriptor.name == id {
                            if let Some(group_name) = str_at(sg, "GroupName") {
                                descriptor = descriptor.with_name(group_name);
                            }
                        }
                        Some(descriptor)
                    })
                    .collect()
            }
            VpcPart::Igw => {
                let filter = format!("Name=attachment.vpc-id,Values={}", ids.join(","));
                let response = ctx.call(ec2("describe-internet-gateways").arg("filters", filter))?;
                array_at(&response, &["InternetGateways"])
                    .iter()
                    .filter_map(|igw| {
                        let id = str_at(igw, "InternetGatewayId")?;
                        let attached: Vec<&str> = array_at(igw, &["Attachments"])
                            .iter()
                            .filter_map(|a| str_at(a, "VpcId"))
                            .collect();
                        Some(
                            child_descriptor(ctx, part, id, igw, attached.first().copied())
                                .with_attribute("attached_vpcs", attached.join(",")),
                        )
                    })
                    .collect()
            }
            VpcPart::Subnet => {
                let response = ctx.call(ec2("describe-subnets").arg("filters", vpc_filter(&ids)))?;
                array_at(&response, &["Subnets"])
                    .iter()
                    .filter_map(|subnet| {
                        let id = str_at(subnet, "SubnetId")?;
                        Some(child_descriptor(ctx, part, id, subnet, str_at(subnet, "VpcId")))
                    })
                    .collect()
            }
            VpcPart::RouteTable => {
                let response =
                    ctx.call(ec2("describe-route-tables").arg("filters", vpc_filter(&ids)))?;
                array_at(&response, &["RouteTables"])
                    .iter()
                    .filter(|rt| {
                        !array_at(rt, &["Associations"])
                            .iter()
                            .any(|a| a.get("Main").and_then(|m| m.as_bool()).unwrap_or(false))
                    })
                    .filter_map(|rt| {
                        let id = str_at(rt, "RouteTableId")?;
                        Some(child_descriptor(ctx, part, id, rt, str_at(rt, "VpcId")))
                    })
                    .collect()
            }
            VpcPart::Endpoint => {
                let response =
                    ctx.call(ec2("describe-vpc-endpoints").arg("filters", vpc_filter(&ids)))?;
                array_at(&response, &["VpcEndpoints"])
                    .iter()
                    .filter(|ep| {
                        !matches!(
                            str_at(ep, "State").map(|s| s.to_lowercase()).as_deref(),
                            Some("deleted") | Some("deleting")
                        )
                    })
                    .filter_map(|ep| {
                        let id = str_at(ep, "VpcEndpointId")?;
                        let mut descriptor = child_descriptor(ctx, part, id, ep, str_at(ep, "VpcId"));
                        if let Some(service) = str_at(ep, "ServiceName") {
                            descriptor = descriptor.with_attribute("service_name", service);
                            if descriptor.name == id {
                                descriptor = descriptor.with_name(service);
                            }
                        }
                        Some(descriptor)
                    })
                    .collect()
            }
        };
        Ok(found)
    }

    fn delete_eni(&self, ctx: &HandlerContext, resource: &ResourceDescriptor) -> EngineResult<()> {
        let id = resource.native_id.as_str();
        let mut last_seen = resource.attribute("description").unwrap_or_default().to_string();

        let result = poll_until(&ctx.waits.eni, &format!("network interface {} to be released", id), |attempt| {
            let response = match ctx.call(ec2("describe-network-interfaces").arg("network-interface-ids", id)) {
                Ok(r) => r,
                Err(err) if err.is_not_found() => return Ok(PollStatus::Ready(())),
                Err(err) => return Err(err),
            };
            let Some(eni) = array_at(&response, &["NetworkInterfaces"]).first() else {
                return Ok(PollStatus::Ready(()));
            };
            let status = str_at(eni, "Status").unwrap_or("unknown");
            last_seen = format!(
                "{} ({}): {}",
                id,
                status,
                str_at(eni, "Description").unwrap_or_default()
            );

            if status == "available" {
                return match ctx.call(ec2("delete-network-interface").arg("network-interface-id", id)) {
                    Ok(_) => Ok(PollStatus::Ready(())),
                    Err(err) if err.is_not_found() => Ok(PollStatus::Ready(())),
                    Err(ErrorKind::DependencyConflict { .. }) => Ok(PollStatus::Pending(status.to_string())),
                    Err(err) => Err(err),
                };
            }

            // Only interfaces we own can be detached; Lambda/NAT ones are released by AWS
            let requester_managed = eni
                .get("RequesterManaged")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if attempt == 1 && !requester_managed {
                if let Some(attachment) = eni.get("Attachment").and_then(|a| str_at(a, "AttachmentId")) {
                    match ctx.call(
                        ec2("detach-network-interface")
                            .arg("attachment-id", attachment)
                            .flag("force"),
                    ) {
                        Ok(_) => {}
                        Err(err) if err.is_not_found() => {}
                        Err(ErrorKind::DependencyConflict { .. }) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
            Ok(PollStatus::Pending(status.to_string()))
        });

        match result {
            Err(ErrorKind::Timeout { .. }) => Err(ErrorKind::DependencyConflict {
                resource: format!("network interface {}", id),
                blockers: vec![last_seen],
            }),
            other => other,
        }
    }

    fn delete_security_group(&self, ctx: &HandlerContext, id: &str) -> EngineResult<()> {
        let response = match ctx.call(ec2("describe-security-groups").arg("group-ids", id)) {
            Ok(r) => r,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        // Rules referencing other groups keep those groups in use
        if let Some(group) = array_at(&response, &["SecurityGroups"]).first() {
            for (section, operation) in [
                ("IpPermissions", "revoke-security-group-ingress"),
                ("IpPermissionsEgress", "revoke-security-group-egress"),
            ] {
                let rules = array_at(group, &[section]);
                if !rules.is_empty() {
                    ignore_not_found(ctx.call(
                        ec2(operation)
                            .arg("group-id", id)
                            .arg("ip-permissions", Value::Array(rules.to_vec()).to_string()),
                    ))?;
                }
            }
        }
        delete_when_released(
            ctx,
            &format!("security group {}", id),
            ec2("delete-security-group").arg("group-id", id),
        )
    }

    fn delete_route_table(&self, ctx: &HandlerContext, id: &str) -> EngineResult<()> {
        let response = match ctx.call(ec2("describe-route-tables").arg("route-table-ids", id)) {
            Ok(r) => r,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        for table in array_at(&response, &["RouteTables"]) {
            for association in array_at(table, &["Associations"]) {
                let main = association.get("Main").and_then(|m| m.as_bool()).unwrap_or(false);
                if let (false, Some(association_id)) =
                    (main, str_at(association, "RouteTableAssociationId"))
                {
                    ignore_not_found(ctx.call(
                        ec2("disassociate-route-table").arg("association-id", association_id),
                    ))?;
                }
            }
        }
        ignore_not_found(ctx.call(ec2("delete-route-table").arg("route-table-id", id)))
    }

    fn delete_internet_gateway(&self, ctx: &HandlerContext, resource: &ResourceDescriptor) -> EngineResult<()> {
        let id = resource.native_id.as_str();
        let attached = resource.attribute("attached_vpcs").unwrap_or_default();
        for vpc_id in attached.split(',').filter(|v| !v.is_empty()) {
            match ctx.call(
                ec2("detach-internet-gateway")
                    .arg("internet-gateway-id", id)
                    .arg("vpc-id", vpc_id),
            ) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(ErrorKind::Api { code: Some(code), .. }) if code == "Gateway.NotAttached" => {}
                Err(err) => return Err(err),
            }
        }
        ignore_not_found(ctx.call(ec2("delete-internet-gateway").arg("internet-gateway-id", id)))
    }

    fn release_address(&self, ctx: &HandlerContext, resource: &ResourceDescriptor) -> EngineResult<()> {
        if let Some(association) = resource.attribute("association_id") {
            match ctx.call(ec2("disassociate-address").arg("association-id", association)) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                // NAT-held addresses are released by deleting the NAT gateway
                Err(ErrorKind::PermissionDenied(_)) | Err(ErrorKind::DependencyConflict { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        delete_when_released(
            ctx,
            &format!("elastic IP {}", resource.native_id),
            ec2("release-address").arg("allocation-id", &resource.native_id),
        )
    }
}

impl ResourceHandler for VpcPartHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Vpc(self.part)
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let vpcs = matching_vpcs(ctx)?;
        if vpcs.is_empty() && self.part != VpcPart::Eip {
            return Ok(Vec::new());
        }
        // Tagged addresses can outlive their VPC
        self.discover_children(ctx, &vpcs)
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        let id = resource.native_id.as_str();
        match self.part {
            VpcPart::Vpc => {
                match ignore_not_found(ctx.call(ec2("delete-vpc").arg("vpc-id", id))) {
                    Err(ErrorKind::DependencyConflict { .. }) => {
                        let blockers = self.diagnose_blockers(ctx, resource).unwrap_or_default();
                        return Err(ErrorKind::DependencyConflict {
                            resource: format!("VPC {}", id),
                            blockers,
                        });
                    }
                    other => other?,
                }
            }
            VpcPart::Nat => {
                match ctx.call(ec2("delete-nat-gateway").arg("nat-gateway-id", id)) {
                    Ok(_) => return Ok(DeleteProgress::Pending("NAT gateway deleting".to_string())),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
            VpcPart::Eip => self.release_address(ctx, resource)?,
            VpcPart::Eni => self.delete_eni(ctx, resource)?,
            VpcPart::SecurityGroup => self.delete_security_group(ctx, id)?,
            VpcPart::Igw => self.delete_internet_gateway(ctx, resource)?,
            VpcPart::Subnet => delete_when_released(
                ctx,
                &format!("subnet {}", id),
                ec2("delete-subnet").arg("subnet-id", id),
            )?,
            VpcPart::RouteTable => self.delete_route_table(ctx, id)?,
            VpcPart::Endpoint => {
                let response = match ctx.call(ec2("delete-vpc-endpoints").arg("vpc-endpoint-ids", id)) {
                    Ok(r) => r,
                    Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
                    Err(err) => return Err(err),
                };
                if let Some(failure) = array_at(&response, &["Unsuccessful"]).first() {
                    let error = failure.get("Error");
                    let code = error.and_then(|e| str_at(e, "Code"));
                    let message = error.and_then(|e| str_at(e, "Message")).unwrap_or("deletion rejected");
                    if !code.is_some_and(|c| c.ends_with(".NotFound")) {
                        return Err(ErrorKind::Api {
                            code: code.map(str::to_string),
                            message: message.to_string(),
                        });
                    }
                }
            }
        }
        Ok(DeleteProgress::Done)
    }

    fn wait_for_deletion(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<()> {
        if self.part != VpcPart::Nat {
            return Ok(());
        }
        let id = resource.native_id.as_str();
        poll_until(&ctx.waits.nat_gateway, &format!("NAT gateway {} to be deleted", id), |_| {
            let response = match ctx.call(ec2("describe-nat-gateways").arg("nat-gateway-ids", id)) {
                Ok(r) => r,
                Err(err) if err.is_not_found() => return Ok(PollStatus::Ready(())),
                Err(err) => return Err(err),
            };
            match array_at(&response, &["NatGateways"]).first().and_then(|n| str_at(n, "State")) {
                None | Some("deleted") => Ok(PollStatus::Ready(())),
                Some("failed") => Err(ErrorKind::Api {
                    code: None,
                    message: format!("NAT gateway {} entered the failed state", id),
                }),
                Some(state) => Ok(PollStatus::Pending(state.to_string())),
            }
        })
    }

    fn diagnose_blockers(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        let id = resource.native_id.as_str();
        match self.part {
            VpcPart::Vpc => {
                let ids = vec![id.to_string()];
                let mut blockers: Vec<String> = describe_enis(ctx, vpc_filter(&ids))?
                    .into_iter()
                    .map(|e| format!("network interface {}", e))
                    .collect();

                let groups = ctx.call(ec2("describe-security-groups").arg("filters", vpc_filter(&ids)))?;
                for group in array_at(&groups, &["SecurityGroups"]) {
                    let name = str_at(group, "GroupName").unwrap_or_default();
                    if name == "default" {
                        continue;
                    }
                    if let Some(group_id) = str_at(group, "GroupId") {
                        blockers.push(format!("security group {} ({})", group_id, name));
                    }
                }

                let nats = ctx.call(ec2("describe-nat-gateways").arg("filter", vpc_filter(&ids)))?;
                for nat in array_at(&nats, &["NatGateways"]) {
                    let state = str_at(nat, "State").unwrap_or("unknown");
                    if state == "deleted" {
                        continue;
                    }
                    if let Some(nat_id) = str_at(nat, "NatGatewayId") {
                        blockers.push(format!("NAT gateway {} ({})", nat_id, state));
                    }
                }
                Ok(blockers)
            }
            VpcPart::SecurityGroup => Ok(describe_enis(ctx, format!("Name=group-id,Values={}", id))?
                .into_iter()
                .map(|e| format!("network interface {}", e))
                .collect()),
            VpcPart::Subnet => Ok(describe_enis(ctx, format!("Name=subnet-id,Values={}", id))?
                .into_iter()
                .map(|e| format!("network interface {}", e))
                .collect()),
            VpcPart::Eni => Ok(describe_enis(ctx, format!("Name=network-interface-id,Values={}", id))?),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{handler_context, vpcs_body, ScriptedCloud};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn vpc_cloud() -> ScriptedCloud {
        ScriptedCloud::new().respond(
            "ec2",
            "describe-vpcs",
            vpcs_body(&[("vpc-1", "proj-dev-vpc"), ("vpc-2", "other-vpc")]),
        )
    }

    #[test]
    fn test_children_filtered_by_matching_vpc() {
        let cloud = Arc::new(vpc_cloud().on("ec2", "describe-subnets", |req| {
            assert_eq!(req.value_of("filters"), Some("Name=vpc-id,Values=vpc-1"));
            Ok(json!({"Subnets": [
                {"SubnetId": "subnet-a", "VpcId": "vpc-1", "Tags": [{"Key": "Name", "Value": "proj-dev-private-1"}]},
                {"SubnetId": "subnet-b", "VpcId": "vpc-1"}
            ]}))
        }));
        let found = handler_for(VpcPart::Subnet).discover(&handler_context(cloud)).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "proj-dev-private-1");
        assert_eq!(found[1].name, "subnet-b");
        assert_eq!(found[0].attribute("vpc_id"), Some("vpc-1"));
    }

    #[test]
    fn test_default_group_and_main_route_table_excluded() {
        let cloud = Arc::new(
            vpc_cloud()
                .respond(
                    "ec2",
                    "describe-security-groups",
                    json!({"SecurityGroups": [
                        {"GroupId": "sg-default", "GroupName": "default", "VpcId": "vpc-1"},
                        {"GroupId": "sg-lambda", "GroupName": "proj-dev-lambda", "VpcId": "vpc-1"}
                    ]}),
                )
                .respond(
                    "ec2",
                    "describe-route-tables",
                    json!({"RouteTables": [
                        {"RouteTableId": "rtb-main", "Associations": [{"Main": true}]},
                        {"RouteTableId": "rtb-private", "Associations": [{"Main": false, "RouteTableAssociationId": "rtbassoc-1"}]}
                    ]}),
                ),
        );
        let ctx = handler_context(cloud);
        let groups = handler_for(VpcPart::SecurityGroup).discover(&ctx).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].native_id, "sg-lambda");
        assert_eq!(groups[0].name, "proj-dev-lambda");

        let tables = handler_for(VpcPart::RouteTable).discover(&ctx).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].native_id, "rtb-private");
    }

    #[test]
    fn test_no_matching_vpc_means_no_children_calls() {
        let cloud = Arc::new(
            ScriptedCloud::new().respond("ec2", "describe-vpcs", vpcs_body(&[("vpc-2", "other")])),
        );
        let found = handler_for(VpcPart::Eni).discover(&handler_context(cloud.clone())).unwrap();
        assert!(found.is_empty());
        assert_eq!(cloud.operations(), vec!["ec2 describe-vpcs"]);
    }

    #[test]
    fn test_nat_delete_waits_for_deleted_state() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let cloud = Arc::new(ScriptedCloud::new().on("ec2", "describe-nat-gateways", move |_| {
            let state = if counter.fetch_add(1, Ordering::SeqCst) < 1 { "deleting" } else { "deleted" };
            Ok(json!({"NatGateways": [{"NatGatewayId": "nat-1", "State": state}]}))
        }));
        let ctx = handler_context(cloud.clone());
        let handler = handler_for(VpcPart::Nat);
        let nat = ctx.descriptor(ResourceType::Vpc(VpcPart::Nat), "nat-1");

        assert!(matches!(handler.delete(&ctx, &nat).unwrap(), DeleteProgress::Pending(_)));
        handler.wait_for_deletion(&ctx, &nat).unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_igw_detached_before_delete() {
        let cloud = Arc::new(ScriptedCloud::new());
        let ctx = handler_context(cloud.clone());
        let igw = ctx
            .descriptor(ResourceType::Vpc(VpcPart::Igw), "igw-1")
            .with_attribute("attached_vpcs", "vpc-1");
        handler_for(VpcPart::Igw).delete(&ctx, &igw).unwrap();
        assert_eq!(
            cloud.operations(),
            vec!["ec2 detach-internet-gateway", "ec2 delete-internet-gateway"]
        );
    }

    #[test]
    fn test_stuck_eni_reports_dependency_conflict() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "ec2",
            "describe-network-interfaces",
            json!({"NetworkInterfaces": [{
                "NetworkInterfaceId": "eni-1",
                "Status": "in-use",
                "RequesterManaged": true,
                "Description": "AWS Lambda VPC ENI-proj-query-handler-dev",
                "Attachment": {"AttachmentId": "eni-attach-1"}
            }]}),
        ));
        let ctx = handler_context(cloud.clone());
        let eni = ctx.descriptor(ResourceType::Vpc(VpcPart::Eni), "eni-1");

        let err = handler_for(VpcPart::Eni).delete(&ctx, &eni).unwrap_err();
        match err {
            ErrorKind::DependencyConflict { blockers, .. } => {
                assert!(blockers[0].contains("AWS Lambda VPC ENI"));
            }
            other => panic!("unexpected error: {}", other),
        }
        // Requester-managed interfaces are never force-detached
        assert_eq!(cloud.count("ec2", "detach-network-interface"), 0);
        assert_eq!(cloud.count("ec2", "describe-network-interfaces"), 3);
        assert_eq!(cloud.count("ec2", "delete-network-interface"), 0);
    }

    #[test]
    fn test_available_eni_is_deleted() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "ec2",
            "describe-network-interfaces",
            json!({"NetworkInterfaces": [{"NetworkInterfaceId": "eni-2", "Status": "available"}]}),
        ));
        let ctx = handler_context(cloud.clone());
        let eni = ctx.descriptor(ResourceType::Vpc(VpcPart::Eni), "eni-2");
        assert_eq!(
            handler_for(VpcPart::Eni).delete(&ctx, &eni).unwrap(),
            DeleteProgress::Done
        );
        assert_eq!(cloud.count("ec2", "delete-network-interface"), 1);
    }

    #[test]
    fn test_vpc_blockers_list_enis_and_groups() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .respond(
                    "ec2",
                    "describe-network-interfaces",
                    json!({"NetworkInterfaces": [
                        {"NetworkInterfaceId": "eni-1", "Status": "in-use", "Description": "lambda"},
                        {"NetworkInterfaceId": "eni-2", "Status": "in-use"}
                    ]}),
                )
                .respond(
                    "ec2",
                    "describe-security-groups",
                    json!({"SecurityGroups": [
                        {"GroupId": "sg-0", "GroupName": "default"},
                        {"GroupId": "sg-1", "GroupName": "proj-dev-lambda"}
                    ]}),
                ),
        );
        let ctx = handler_context(cloud);
        let vpc = ctx.descriptor(ResourceType::Vpc(VpcPart::Vpc), "vpc-1");
        let blockers = handler_for(VpcPart::Vpc).diagnose_blockers(&ctx, &vpc).unwrap();
        assert_eq!(
            blockers,
            vec![
                "network interface eni-1 (in-use): lambda",
                "network interface eni-2 (in-use)",
                "security group sg-1 (proj-dev-lambda)",
            ]
        );
    }
}
